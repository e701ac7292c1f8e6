//! Client-side SASL authentication.
//!
//! This crate implements the mechanism side of SASL authentication for
//! initiating entities: a [`Mechanism`][`client::Mechanism`] produces the
//! payloads which the protocol layer (XMPP in our case, but nothing in here
//! depends on XMPP) wraps into its authentication exchange.
//!
//! Provided mechanisms:
//!
//! - `PLAIN`
//! - `SCRAM-SHA-1`, `SCRAM-SHA-256` and `SCRAM-SHA-512` (feature `scram`,
//!   enabled by default)
//!
//! # Usage
//!
//! ```
//! use magpie_sasl::client::Mechanism;
//! use magpie_sasl::client::mechanisms::Plain;
//! use magpie_sasl::common::Credentials;
//!
//! let creds = Credentials::default()
//!     .with_username("juliet")
//!     .with_password("pencil");
//! let mut mechanism = Plain::from_credentials(creds).unwrap();
//! let initial = mechanism.initial().unwrap();
//! assert_eq!(initial, b"\0juliet\0pencil");
//! ```

#![deny(unsafe_code, missing_docs, bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod client;
pub mod common;
