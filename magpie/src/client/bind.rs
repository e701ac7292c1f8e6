//! Resource binding, the last negotiation step before the session opens.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::error::{Error, ProtocolError};
use crate::jid::Jid;
use crate::proto::{Frame, Packet, XmppCodec};
use crate::stanza::error::StanzaError;
use crate::stanza::{Bind, Iq, IqType, Payload, Stanza, StreamItem};

const BIND_REQ_ID: &str = "resource-bind";

/// Sends the bind IQ and waits for the server-assigned full JID.
pub(crate) async fn bind<T>(
    framed: &mut Framed<T, XmppCodec>,
    resource: Option<&str>,
) -> Result<Jid, Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let request = Iq::set(Payload::Bind(Bind::request(resource))).with_id(BIND_REQ_ID);
    framed.send(Packet::Element(request.to_element())).await?;

    loop {
        match framed.next().await {
            Some(Ok(Frame::Item(StreamItem::Stanza(Stanza::Iq(iq)))))
                if iq.id.as_deref() == Some(BIND_REQ_ID) =>
            {
                match iq.typ {
                    IqType::Result => {
                        for payload in &iq.payloads {
                            if let Payload::Bind(Bind { jid: Some(jid), .. }) = payload {
                                return Ok(jid.clone());
                            }
                        }
                        return Err(ProtocolError::InvalidBindResponse.into());
                    }
                    IqType::Error => {
                        let error = iq
                            .error
                            .unwrap_or_else(|| StanzaError::cancel("undefined-condition"));
                        return Err(ProtocolError::BindFailed(error).into());
                    }
                    _ => return Err(ProtocolError::InvalidBindResponse.into()),
                }
            }
            Some(Ok(Frame::Item(StreamItem::StreamError(error)))) => {
                return Err(ProtocolError::Stream(error).into());
            }
            Some(Ok(_)) => {
                // ignore and loop
            }
            Some(Err(e)) => return Err(e),
            None => return Err(Error::Disconnected),
        }
    }
}
