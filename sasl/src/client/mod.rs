//! The client (initiating) side of a SASL exchange.

use core::fmt;
use std::error::Error as StdError;

pub mod mechanisms;

/// Errors raised by a mechanism while processing server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismError {
    /// The mechanism does not expect a challenge in its current state.
    UnexpectedChallenge,
    /// A challenge or additional-data payload was not valid UTF-8.
    NotUtf8,
    /// A required attribute was missing from the server message.
    MissingAttribute(&'static str),
    /// An attribute of the server message could not be parsed.
    InvalidAttribute(&'static str),
    /// The server nonce does not extend the client nonce.
    NonceMismatch,
    /// The server requested an iteration count of zero.
    InvalidIterationCount,
    /// The server signature did not verify; the server does not know the
    /// password it claimed to verify.
    ServerSignatureMismatch,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::UnexpectedChallenge => {
                write!(fmt, "mechanism received a challenge it did not expect")
            }
            MechanismError::NotUtf8 => write!(fmt, "server payload is not valid UTF-8"),
            MechanismError::MissingAttribute(name) => {
                write!(fmt, "server message is missing the `{}=` attribute", name)
            }
            MechanismError::InvalidAttribute(name) => {
                write!(fmt, "server message has an unparsable `{}=` attribute", name)
            }
            MechanismError::NonceMismatch => {
                write!(fmt, "server nonce does not start with the client nonce")
            }
            MechanismError::InvalidIterationCount => {
                write!(fmt, "server requested an iteration count of zero")
            }
            MechanismError::ServerSignatureMismatch => {
                write!(fmt, "server signature verification failed")
            }
        }
    }
}

impl StdError for MechanismError {}

/// A single-use SASL mechanism.
///
/// A mechanism value carries the state of one authentication attempt and
/// must be discarded afterwards, whether the attempt succeeded or failed.
pub trait Mechanism {
    /// The name of the mechanism as announced by servers, e.g. `PLAIN` or
    /// `SCRAM-SHA-256`.
    fn name(&self) -> &'static str;

    /// Selection priority; among mechanisms offered by the server, the one
    /// with the highest priority is used.
    fn priority(&self) -> u32;

    /// Whether the mechanism sends an initial response together with the
    /// authentication request.
    fn has_initial_response(&self) -> bool {
        true
    }

    /// Provides the initial payload of the mechanism.
    fn initial(&mut self) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Creates a response to a server challenge.
    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Verifies the additional data sent with the server's success
    /// notification, if any.
    fn success(&mut self, _data: &[u8]) -> Result<(), MechanismError> {
        Ok(())
    }
}
