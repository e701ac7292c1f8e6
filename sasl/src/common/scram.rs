//! Hash providers for the SCRAM family (RFC 5802).

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1 as Sha1Digest;
use sha2::{Digest, Sha256 as Sha256Digest, Sha512 as Sha512Digest};

/// A hash function family usable with [`Scram`][`crate::client::mechanisms::Scram`].
pub trait ScramProvider {
    /// The mechanism name derived from the hash, e.g. `SCRAM-SHA-256`.
    fn name() -> &'static str;

    /// Selection priority of the mechanism built on this hash.
    fn priority() -> u32;

    /// `H(data)`.
    fn hash(data: &[u8]) -> Vec<u8>;

    /// `HMAC-H(key, data)`.
    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8>;

    /// `Hi(password, salt, iterations)`, i.e. PBKDF2 over HMAC-H.
    fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8>;
}

/// Provider for `SCRAM-SHA-1`.
pub struct Sha1;

impl ScramProvider for Sha1 {
    fn name() -> &'static str {
        "SCRAM-SHA-1"
    }

    fn priority() -> u32 {
        200
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha1Digest::digest(data).to_vec()
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha1Digest>::new_from_slice(key).expect("hmac accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut out = vec![0u8; 20];
        pbkdf2_hmac::<Sha1Digest>(password, salt, iterations, &mut out);
        out
    }
}

/// Provider for `SCRAM-SHA-256`.
pub struct Sha256;

impl ScramProvider for Sha256 {
    fn name() -> &'static str {
        "SCRAM-SHA-256"
    }

    fn priority() -> u32 {
        300
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha256Digest::digest(data).to_vec()
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha256Digest>::new_from_slice(key).expect("hmac accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        pbkdf2_hmac::<Sha256Digest>(password, salt, iterations, &mut out);
        out
    }
}

/// Provider for `SCRAM-SHA-512`.
pub struct Sha512;

impl ScramProvider for Sha512 {
    fn name() -> &'static str {
        "SCRAM-SHA-512"
    }

    fn priority() -> u32 {
        400
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha512Digest::digest(data).to_vec()
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha512Digest>::new_from_slice(key).expect("hmac accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut out = vec![0u8; 64];
        pbkdf2_hmac::<Sha512Digest>(password, salt, iterations, &mut out);
        out
    }
}
