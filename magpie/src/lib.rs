//! Asynchronous [XMPP](https://xmpp.org/) client implementation with
//! non-blocking I/O on [tokio](https://tokio.rs/).
//!
//! # Getting started
//!
//! Build a [`ClientConfig`], call [`Client::connect`], then exchange
//! stanzas:
//!
//! ```no_run
//! use magpie::{Client, ClientConfig};
//!
//! # async fn example() -> Result<(), magpie::Error> {
//! let config = ClientConfig::builder()
//!     .service_domain("im.example.com")
//!     .username("juliet")
//!     .password("pencil")
//!     .resource("balcony")
//!     .build()
//!     .expect("config");
//! let client = Client::connect(config).await?;
//! println!("connected as {}", client.bound_jid());
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature overview
//!
//! Supported:
//! - [x] STARTTLS and direct-TLS client-to-server streams (rustls)
//! - [x] SASL PLAIN and SCRAM-SHA-1/-256/-512 with server-signature
//!       verification
//! - [x] Resource binding
//! - [x] IQ request/response correlation with per-request timeouts
//! - [x] XEP-0199 pings, answered and emitted as keepalives
//! - [x] Extensible stanza payloads via the provider registry
//!
//! Not supported:
//! - [ ] Server and component connections
//! - [ ] Stream management (XEP-0198)
//! - [ ] Stream compression

#![deny(unsafe_code, missing_docs, bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod client;
pub mod config;
pub mod connect;
/// Detailed error types
pub mod error;
pub mod jid;
pub mod ns;
pub mod proto;
pub mod stanza;
pub mod xml;

#[doc(inline)]
pub use crate::error::Error;
pub use client::{
    Client, ConnectionEvent, ConnectionState, HandlerMode, IqRequestHandler, IqRequestType,
    IqResponse, IqResponseToken,
};
pub use config::{ClientConfig, ClientConfigBuilder, SecurityMode};
pub use jid::Jid;
pub use stanza::{Iq, Message, Presence, Stanza};
