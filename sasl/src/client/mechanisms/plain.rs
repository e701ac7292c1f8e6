//! PLAIN (RFC 4616).

use crate::client::{Mechanism, MechanismError};
use crate::common::Credentials;

/// The PLAIN mechanism: username and password in the clear.
///
/// The transport below must be encrypted before this mechanism may be used;
/// enforcing that is the caller's job, since only the caller knows whether
/// TLS has been established.
pub struct Plain {
    username: String,
    password: String,
}

impl Plain {
    /// Constructs a PLAIN mechanism from the given credentials.
    pub fn from_credentials(credentials: Credentials) -> Result<Plain, MechanismError> {
        Ok(Plain {
            username: credentials.username,
            password: credentials.password,
        })
    }
}

impl Mechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn initial(&mut self) -> Result<Vec<u8>, MechanismError> {
        let mut payload = Vec::with_capacity(self.username.len() + self.password.len() + 2);
        payload.push(0);
        payload.extend_from_slice(self.username.as_bytes());
        payload.push(0);
        payload.extend_from_slice(self.password.as_bytes());
        Ok(payload)
    }

    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Err(MechanismError::UnexpectedChallenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_response() {
        let creds = Credentials::default()
            .with_username("juliet")
            .with_password("pencil");
        let mut mechanism = Plain::from_credentials(creds).unwrap();
        assert_eq!(mechanism.initial().unwrap(), b"\0juliet\0pencil");
    }

    #[cfg(feature = "scram")]
    #[test]
    fn initial_response_base64() {
        use base64::prelude::*;

        let creds = Credentials::default()
            .with_username("juliet")
            .with_password("pencil");
        let mut mechanism = Plain::from_credentials(creds).unwrap();
        assert_eq!(
            BASE64_STANDARD.encode(mechanism.initial().unwrap()),
            "AGp1bGlldABwZW5jaWw="
        );
    }

    #[test]
    fn refuses_challenges() {
        let mut mechanism = Plain::from_credentials(Credentials::default()).unwrap();
        assert_eq!(
            mechanism.response(b"irrelevant"),
            Err(MechanismError::UnexpectedChallenge)
        );
    }
}
