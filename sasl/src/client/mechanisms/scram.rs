//! SCRAM (RFC 5802), without channel binding.

use std::marker::PhantomData;

use base64::prelude::*;
use rand::{thread_rng, Rng};

use crate::client::{Mechanism, MechanismError};
use crate::common::scram::ScramProvider;
use crate::common::Credentials;

/// GS2 header for a client which neither uses nor advertises channel
/// binding, and its base64 form used in the client-final message.
const GS2_HEADER: &str = "n,,";
const GS2_HEADER_B64: &str = "biws";

const NONCE_LEN: usize = 24;

/// Iteration counts below this are accepted for interoperability but
/// logged, since they weaken the derived key (RFC 7677 recommends 4096).
const SANE_ITERATION_COUNT: u32 = 4096;

enum ScramState {
    Initial,
    SentInitial {
        client_first_bare: String,
    },
    AwaitingSuccess {
        server_signature: Vec<u8>,
    },
    Finished,
}

/// The SCRAM mechanism family, parameterized over the hash in use.
///
/// ```
/// use magpie_sasl::client::mechanisms::Scram;
/// use magpie_sasl::common::scram::Sha256;
/// use magpie_sasl::common::Credentials;
///
/// let creds = Credentials::default()
///     .with_username("juliet")
///     .with_password("pencil");
/// let mechanism = Scram::<Sha256>::from_credentials(creds).unwrap();
/// ```
pub struct Scram<S: ScramProvider> {
    username: String,
    password: String,
    client_nonce: String,
    state: ScramState,
    _marker: PhantomData<S>,
}

impl<S: ScramProvider> Scram<S> {
    /// Constructs a SCRAM mechanism from the given credentials, generating
    /// a fresh random client nonce.
    pub fn from_credentials(credentials: Credentials) -> Result<Scram<S>, MechanismError> {
        let mut nonce = [0u8; NONCE_LEN];
        thread_rng().fill(&mut nonce[..]);
        Ok(Self::with_client_nonce(
            credentials,
            BASE64_STANDARD.encode(nonce),
        ))
    }

    fn with_client_nonce(credentials: Credentials, client_nonce: String) -> Scram<S> {
        Scram {
            username: credentials.username,
            password: credentials.password,
            client_nonce,
            state: ScramState::Initial,
            _marker: PhantomData,
        }
    }
}

impl<S: ScramProvider> Mechanism for Scram<S> {
    fn name(&self) -> &'static str {
        S::name()
    }

    fn priority(&self) -> u32 {
        S::priority()
    }

    fn initial(&mut self) -> Result<Vec<u8>, MechanismError> {
        let client_first_bare = format!(
            "n={},r={}",
            escape_username(&self.username),
            self.client_nonce
        );
        let payload = format!("{}{}", GS2_HEADER, client_first_bare);
        self.state = ScramState::SentInitial { client_first_bare };
        Ok(payload.into_bytes())
    }

    fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        let client_first_bare = match core::mem::replace(&mut self.state, ScramState::Finished) {
            ScramState::SentInitial { client_first_bare } => client_first_bare,
            _ => return Err(MechanismError::UnexpectedChallenge),
        };

        let server_first =
            core::str::from_utf8(challenge).map_err(|_| MechanismError::NotUtf8)?;
        let server_nonce = scram_attribute(server_first, "r")?;
        let salt_b64 = scram_attribute(server_first, "s")?;
        let iterations: u32 = scram_attribute(server_first, "i")?
            .parse()
            .map_err(|_| MechanismError::InvalidAttribute("i"))?;

        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(MechanismError::NonceMismatch);
        }
        if iterations == 0 {
            return Err(MechanismError::InvalidIterationCount);
        }
        if iterations < SANE_ITERATION_COUNT {
            log::warn!(
                "server requested a weak SCRAM iteration count of {}",
                iterations
            );
        }
        let salt = BASE64_STANDARD
            .decode(salt_b64)
            .map_err(|_| MechanismError::InvalidAttribute("s"))?;

        let salted_password = S::derive(self.password.as_bytes(), &salt, iterations);
        let client_key = S::hmac(&salted_password, b"Client Key");
        let stored_key = S::hash(&client_key);

        let client_final_without_proof = format!("c={},r={}", GS2_HEADER_B64, server_nonce);
        let auth_message = format!(
            "{},{},{}",
            client_first_bare, server_first, client_final_without_proof
        );

        let client_signature = S::hmac(&stored_key, auth_message.as_bytes());
        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(key, sig)| key ^ sig)
            .collect();

        let server_key = S::hmac(&salted_password, b"Server Key");
        let server_signature = S::hmac(&server_key, auth_message.as_bytes());

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64_STANDARD.encode(client_proof)
        );
        self.state = ScramState::AwaitingSuccess { server_signature };
        Ok(client_final.into_bytes())
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        let server_signature = match core::mem::replace(&mut self.state, ScramState::Finished) {
            ScramState::AwaitingSuccess { server_signature } => server_signature,
            _ => return Err(MechanismError::UnexpectedChallenge),
        };

        let server_final = core::str::from_utf8(data).map_err(|_| MechanismError::NotUtf8)?;
        let verifier = scram_attribute(server_final, "v")?;
        let verifier = BASE64_STANDARD
            .decode(verifier)
            .map_err(|_| MechanismError::InvalidAttribute("v"))?;

        if verifier != server_signature {
            return Err(MechanismError::ServerSignatureMismatch);
        }
        Ok(())
    }
}

/// Extracts the value of a `name=value` attribute from a comma-separated
/// SCRAM message.
fn scram_attribute<'a>(message: &'a str, name: &'static str) -> Result<&'a str, MechanismError> {
    message
        .split(',')
        .find_map(|part| {
            part.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .ok_or(MechanismError::MissingAttribute(name))
}

/// RFC 5802 username escaping: `,` and `=` are not allowed verbatim inside
/// the `n=` attribute.
fn escape_username(username: &str) -> String {
    let mut escaped = String::with_capacity(username.len());
    for c in username.chars() {
        match c {
            ',' => escaped.push_str("=2C"),
            '=' => escaped.push_str("=3D"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scram::{Sha1, Sha256};

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials::default()
            .with_username(username)
            .with_password(password)
    }

    /// RFC 5802 §5 example exchange.
    #[test]
    fn rfc5802_sha1_vector() {
        let mut mechanism = Scram::<Sha1>::with_client_nonce(
            creds("user", "pencil"),
            "fyko+d2lbbFgONRv9qkxdawL".to_string(),
        );
        assert_eq!(
            mechanism.initial().unwrap(),
            b"n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL"
        );
        let response = mechanism
            .response(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();
        assert_eq!(
            response,
            &b"c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="[..]
        );
        mechanism
            .success(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=")
            .unwrap();
    }

    /// RFC 7677 §3 example exchange.
    #[test]
    fn rfc7677_sha256_vector() {
        let mut mechanism = Scram::<Sha256>::with_client_nonce(
            creds("user", "pencil"),
            "rOprNGfwEbeRWgbNEkqO".to_string(),
        );
        assert_eq!(
            mechanism.initial().unwrap(),
            b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO"
        );
        let response = mechanism
            .response(
                b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
            )
            .unwrap();
        assert_eq!(
            core::str::from_utf8(&response).unwrap(),
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );
        mechanism
            .success(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
            .unwrap();
    }

    #[test]
    fn tampered_server_signature() {
        let mut mechanism = Scram::<Sha1>::with_client_nonce(
            creds("user", "pencil"),
            "fyko+d2lbbFgONRv9qkxdawL".to_string(),
        );
        mechanism.initial().unwrap();
        mechanism
            .response(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();
        assert_eq!(
            mechanism.success(b"v=AAF9pqV8S7suAoZWja4dJRkFsKQ="),
            Err(MechanismError::ServerSignatureMismatch)
        );
    }

    #[test]
    fn nonce_must_extend_client_nonce() {
        let mut mechanism =
            Scram::<Sha1>::with_client_nonce(creds("user", "pencil"), "abcdef".to_string());
        mechanism.initial().unwrap();
        assert_eq!(
            mechanism.response(b"r=somethingelse,s=QSXCR+Q6sek8bf92,i=4096"),
            Err(MechanismError::NonceMismatch)
        );
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut mechanism =
            Scram::<Sha1>::with_client_nonce(creds("user", "pencil"), "abcdef".to_string());
        mechanism.initial().unwrap();
        assert_eq!(
            mechanism.response(b"r=abcdefgh,s=QSXCR+Q6sek8bf92,i=0"),
            Err(MechanismError::InvalidIterationCount)
        );
    }

    #[test]
    fn username_escaping() {
        assert_eq!(escape_username("juliet"), "juliet");
        assert_eq!(escape_username("a,b=c"), "a=2Cb=3Dc");
    }
}
