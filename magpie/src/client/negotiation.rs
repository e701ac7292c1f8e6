//! Stream negotiation: from a fresh transport to a bound session.
//!
//! The sequence follows RFC 6120: stream open, feature inspection, then
//! at most one STARTTLS upgrade and one SASL exchange (each followed by a
//! stream restart, so `AwaitingFeatures` is entered up to three times),
//! and finally resource binding.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, FramedParts};

use crate::client::state::{ConnectionState, StateHandle};
use crate::client::transport::{tls_connect, Transport};
use crate::client::{auth, bind};
use crate::config::{ClientConfig, SecurityMode};
use crate::error::{Error, ProtocolError};
use crate::jid::Jid;
use crate::proto::{Frame, Packet, XmppCodec};
use crate::stanza::{starttls, StreamFeatures, StreamItem};

/// A fully negotiated session, ready for the stanza worker.
pub(crate) struct Session<S: AsyncRead + AsyncWrite + Unpin> {
    pub(crate) framed: Framed<Transport<S>, XmppCodec>,
    pub(crate) bound_jid: Jid,
    pub(crate) stream_id: Option<String>,
    #[allow(dead_code)]
    pub(crate) features: StreamFeatures,
}

/// Drives the negotiation state machine over `io` until the session is
/// active.
pub(crate) async fn establish<S>(
    io: S,
    config: &ClientConfig,
    state: &StateHandle,
) -> Result<Session<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let transport = if config.direct_tls {
        Transport::Tls(Box::new(tls_connect(io, &config.service_domain).await?))
    } else {
        Transport::Plain(io)
    };
    let mut framed = Framed::new(transport, XmppCodec::new(config.max_frame_bytes));

    send_prologue(&mut framed, config).await?;
    state.transition(ConnectionState::AwaitingFeatures);
    let (mut stream_id, mut features) = await_features(&mut framed).await?;

    loop {
        let encrypted = framed.get_ref().is_encrypted();

        if !encrypted
            && config.security_mode == SecurityMode::Required
            && !features.starttls_available
        {
            return Err(ProtocolError::TlsRequiredButUnavailable.into());
        }

        if !encrypted
            && features.starttls_available
            && config.security_mode != SecurityMode::Disabled
        {
            state.transition(ConnectionState::TlsNegotiating);
            framed.send(Packet::Element(starttls::request())).await?;
            await_proceed(&mut framed).await?;

            let parts = framed.into_parts();
            let Transport::Plain(stream) = parts.io else {
                return Err(Error::InvalidState);
            };
            let mut codec = parts.codec;
            codec.reset();
            let tls_stream = tls_connect(stream, &config.service_domain).await?;
            framed = Framed::from_parts(FramedParts::new::<Packet>(
                Transport::Tls(Box::new(tls_stream)),
                codec,
            ));

            send_prologue(&mut framed, config).await?;
            state.transition(ConnectionState::AwaitingFeatures);
            (stream_id, features) = await_features(&mut framed).await?;
            continue;
        }

        if !features.mechanisms.is_empty() && !state.is_authenticated() {
            state.transition(ConnectionState::SaslAuth);
            auth::authenticate(&mut framed, config, &features.mechanisms, encrypted).await?;
            state.set_authenticated();

            framed = restart(framed);
            send_prologue(&mut framed, config).await?;
            state.transition(ConnectionState::AwaitingFeatures);
            (stream_id, features) = await_features(&mut framed).await?;
            continue;
        }

        if features.bind_available {
            state.transition(ConnectionState::Binding);
            let bound_jid = bind::bind(&mut framed, config.resource.as_deref()).await?;
            log::info!("session active as {}", bound_jid);
            state.transition(ConnectionState::SessionActive);
            return Ok(Session {
                framed,
                bound_jid,
                stream_id,
                features,
            });
        }

        return Err(ProtocolError::InvalidFeatures.into());
    }
}

async fn send_prologue<T>(
    framed: &mut Framed<T, XmppCodec>,
    config: &ClientConfig,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    framed
        .send(Packet::StreamStart {
            to: config.service_domain.clone(),
            lang: config.xml_lang.clone(),
        })
        .await
}

/// Discards the parser state for a stream restart, keeping the codec so
/// that the reset is observable and the XML declaration stays suppressed.
fn restart<T>(framed: Framed<T, XmppCodec>) -> Framed<T, XmppCodec>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut parts = framed.into_parts();
    parts.codec.reset();
    let io = parts.io;
    let codec = parts.codec;
    Framed::from_parts(FramedParts::new::<Packet>(io, codec))
}

/// Waits for the server's stream header and the `<stream:features/>`
/// that follows it.
async fn await_features<T>(
    framed: &mut Framed<T, XmppCodec>,
) -> Result<(Option<String>, StreamFeatures), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream_id = None;
    loop {
        match framed.next().await {
            Some(Ok(Frame::StreamStart(attrs))) => {
                stream_id = attrs.get("id").cloned();
            }
            Some(Ok(Frame::Item(StreamItem::Features(features)))) => {
                return Ok((stream_id, features));
            }
            Some(Ok(Frame::Item(StreamItem::StreamError(error)))) => {
                return Err(ProtocolError::Stream(error).into());
            }
            Some(Ok(Frame::Item(other))) => {
                return Err(ProtocolError::UnexpectedElement(other.name()).into());
            }
            Some(Ok(Frame::StreamEnd)) | None => return Err(Error::Disconnected),
            Some(Err(e)) => return Err(e),
        }
    }
}

/// Waits for the server's answer to `<starttls/>`.
async fn await_proceed<T>(framed: &mut Framed<T, XmppCodec>) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match framed.next().await {
        Some(Ok(Frame::Item(StreamItem::TlsProceed))) => Ok(()),
        Some(Ok(Frame::Item(StreamItem::TlsFailure))) => Err(ProtocolError::TlsRefused.into()),
        Some(Ok(Frame::Item(StreamItem::StreamError(error)))) => {
            Err(ProtocolError::Stream(error).into())
        }
        Some(Ok(Frame::Item(other))) => {
            Err(ProtocolError::UnexpectedElement(other.name()).into())
        }
        Some(Ok(Frame::StreamStart(_))) => {
            Err(ProtocolError::UnexpectedElement("stream:stream".to_owned()).into())
        }
        Some(Ok(Frame::StreamEnd)) | None => Err(Error::Disconnected),
        Some(Err(e)) => Err(e),
    }
}
