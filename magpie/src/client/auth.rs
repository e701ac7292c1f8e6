//! The SASL negotiator: mechanism selection and the authentication
//! exchange.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use magpie_sasl::client::mechanisms::{Plain, Scram};
use magpie_sasl::client::Mechanism;
use magpie_sasl::common::scram::{Sha1, Sha256, Sha512};
use magpie_sasl::common::Credentials;

use crate::config::ClientConfig;
use crate::error::{AuthError, Error, ProtocolError};
use crate::proto::{Frame, Packet, XmppCodec};
use crate::stanza::{sasl, StreamItem};

/// Picks the mechanism to authenticate with: the highest-priority one
/// that is both enabled and offered, skipping PLAIN on unencrypted
/// streams.
///
/// If PLAIN was the only viable choice but the stream is not encrypted,
/// the selection fails with [`AuthError::InsecurePlainRefused`] before
/// anything reaches the wire.
fn select_mechanism(
    config: &ClientConfig,
    offered: &[String],
    encrypted: bool,
) -> Result<Box<dyn Mechanism + Send>, Error> {
    let credentials = Credentials::default()
        .with_username(&config.username)
        .with_password(&config.password);

    let mut refused_insecure_plain = false;
    let mut best: Option<Box<dyn Mechanism + Send>> = None;
    for name in &config.enabled_mechanisms {
        if !offered.iter().any(|offer| offer == name) {
            continue;
        }
        let mechanism: Box<dyn Mechanism + Send> = match name.as_str() {
            "PLAIN" => {
                if !encrypted {
                    refused_insecure_plain = true;
                    continue;
                }
                Box::new(Plain::from_credentials(credentials.clone()).map_err(AuthError::Sasl)?)
            }
            "SCRAM-SHA-1" => Box::new(
                Scram::<Sha1>::from_credentials(credentials.clone()).map_err(AuthError::Sasl)?,
            ),
            "SCRAM-SHA-256" => Box::new(
                Scram::<Sha256>::from_credentials(credentials.clone()).map_err(AuthError::Sasl)?,
            ),
            "SCRAM-SHA-512" => Box::new(
                Scram::<Sha512>::from_credentials(credentials.clone()).map_err(AuthError::Sasl)?,
            ),
            other => {
                log::debug!("ignoring unknown enabled mechanism {:?}", other);
                continue;
            }
        };
        // Strict comparison keeps the earliest candidate on priority ties,
        // which makes selection stable.
        match best {
            Some(ref current) if current.priority() >= mechanism.priority() => {}
            _ => best = Some(mechanism),
        }
    }

    match best {
        Some(mechanism) => Ok(mechanism),
        None if refused_insecure_plain => Err(AuthError::InsecurePlainRefused.into()),
        None => Err(AuthError::NoMechanism.into()),
    }
}

/// Runs one SASL authentication attempt to completion.
///
/// The mechanism state is created here and dropped on return, so a
/// reconnection attempt always starts from a clean slate.
pub(crate) async fn authenticate<T>(
    framed: &mut Framed<T, XmppCodec>,
    config: &ClientConfig,
    offered: &[String],
    encrypted: bool,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut mechanism = select_mechanism(config, offered, encrypted)?;
    log::info!(
        "authenticating as {:?} via {}",
        config.username,
        mechanism.name()
    );

    let initial = mechanism.initial().map_err(AuthError::Sasl)?;
    framed
        .send(Packet::Element(sasl::auth(mechanism.name(), &initial)))
        .await?;

    loop {
        match framed.next().await {
            Some(Ok(Frame::Item(StreamItem::Challenge(data)))) => {
                let response = mechanism.response(&data).map_err(AuthError::Sasl)?;
                framed
                    .send(Packet::Element(sasl::response(&response)))
                    .await?;
            }
            Some(Ok(Frame::Item(StreamItem::Success(data)))) => {
                mechanism.success(&data).map_err(AuthError::Sasl)?;
                return Ok(());
            }
            Some(Ok(Frame::Item(StreamItem::SaslFailure(failure)))) => {
                return Err(AuthError::Fail(failure).into());
            }
            Some(Ok(Frame::Item(StreamItem::StreamError(error)))) => {
                return Err(ProtocolError::Stream(error).into());
            }
            Some(Ok(Frame::Item(other))) => {
                return Err(ProtocolError::UnexpectedElement(other.name()).into());
            }
            Some(Ok(Frame::StreamStart(_))) => {
                return Err(ProtocolError::UnexpectedElement("stream:stream".to_owned()).into());
            }
            Some(Ok(Frame::StreamEnd)) | None => return Err(Error::Disconnected),
            Some(Err(e)) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityMode;

    fn config(mechanisms: &[&str]) -> ClientConfig {
        ClientConfig::builder()
            .service_domain("im.example.com")
            .username("juliet")
            .password("pencil")
            .security_mode(SecurityMode::Disabled)
            .enabled_mechanisms(mechanisms.iter().copied())
            .build()
            .unwrap()
    }

    fn offered(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn strongest_offered_mechanism_wins() {
        let config = config(&["SCRAM-SHA-512", "SCRAM-SHA-256", "SCRAM-SHA-1", "PLAIN"]);
        let mechanism =
            select_mechanism(&config, &offered(&["SCRAM-SHA-1", "SCRAM-SHA-256", "PLAIN"]), true)
                .unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256");
    }

    #[test]
    fn disabled_mechanisms_are_not_considered() {
        let config = config(&["SCRAM-SHA-1"]);
        let mechanism =
            select_mechanism(&config, &offered(&["SCRAM-SHA-256", "SCRAM-SHA-1"]), true).unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-1");
    }

    #[test]
    fn plain_is_allowed_on_encrypted_streams() {
        let config = config(&["PLAIN"]);
        let mechanism = select_mechanism(&config, &offered(&["PLAIN"]), true).unwrap();
        assert_eq!(mechanism.name(), "PLAIN");
    }

    #[test]
    fn plain_on_cleartext_is_refused() {
        let config = config(&["SCRAM-SHA-256", "PLAIN"]);
        let result = select_mechanism(&config, &offered(&["PLAIN"]), false);
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::InsecurePlainRefused))
        ));
    }

    #[test]
    fn scram_on_cleartext_is_preferred_over_refusal() {
        let config = config(&["SCRAM-SHA-256", "PLAIN"]);
        let mechanism =
            select_mechanism(&config, &offered(&["SCRAM-SHA-256", "PLAIN"]), false).unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256");
    }

    #[test]
    fn no_common_mechanism() {
        let config = config(&["SCRAM-SHA-256"]);
        let result = select_mechanism(&config, &offered(&["EXTERNAL"]), true);
        assert!(matches!(result, Err(Error::Auth(AuthError::NoMechanism))));
    }
}
