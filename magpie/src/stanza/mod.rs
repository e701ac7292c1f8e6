//! The stanza data model and the typed layer above the XML tree.

use std::collections::HashSet;

use rand::{thread_rng, Rng};

use crate::error::ParseError;
use crate::ns;
use crate::xml::Element;

pub mod bind;
pub mod error;
pub mod iq;
pub mod message;
pub mod ping;
pub mod presence;
pub mod provider;
pub mod sasl;
pub(crate) mod starttls;
pub mod stream;

pub use self::bind::Bind;
pub use self::iq::{Iq, IqType};
pub use self::message::{Message, MessageType};
pub use self::ping::Ping;
pub use self::presence::{Presence, PresenceType, Show};
pub use self::stream::{StreamError, StreamFeatures};

pub(crate) fn make_id() -> String {
    let id: u64 = thread_rng().gen();
    format!("{}", id)
}

/// A stanza sent or received over the stream.
#[derive(Debug, Clone)]
pub enum Stanza {
    /// IQ stanza
    Iq(Iq),
    /// Message stanza
    Message(Message),
    /// Presence stanza
    Presence(Presence),
}

impl Stanza {
    /// Assign a random ID to the stanza, if no ID has been assigned yet.
    pub fn ensure_id(&mut self) -> &str {
        match self {
            Self::Iq(iq) => iq.id.get_or_insert_with(make_id),
            Self::Message(message) => message.id.get_or_insert_with(make_id),
            Self::Presence(presence) => presence.id.get_or_insert_with(make_id),
        }
    }

    /// The stanza's ID, if set.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Iq(iq) => iq.id.as_deref(),
            Self::Message(message) => message.id.as_deref(),
            Self::Presence(presence) => presence.id.as_deref(),
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        match self {
            Self::Iq(iq) => iq.to_element(),
            Self::Message(message) => message.to_element(),
            Self::Presence(presence) => presence.to_element(),
        }
    }
}

impl From<Iq> for Stanza {
    fn from(other: Iq) -> Self {
        Self::Iq(other)
    }
}

impl From<Message> for Stanza {
    fn from(other: Message) -> Self {
        Self::Message(other)
    }
}

impl From<Presence> for Stanza {
    fn from(other: Presence) -> Self {
        Self::Presence(other)
    }
}

/// A child payload of a stanza: one of the typed extension elements this
/// crate knows about, or a preserved generic element.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// XEP-0199 `<ping/>`
    Ping(Ping),
    /// Resource binding `<bind/>`
    Bind(Bind),
    /// Anything without a registered provider, kept verbatim
    Element(Element),
}

impl Payload {
    /// The element's local name.
    pub fn name(&self) -> &str {
        match self {
            Payload::Ping(_) => "ping",
            Payload::Bind(_) => "bind",
            Payload::Element(el) => el.name(),
        }
    }

    /// The element's namespace.
    pub fn namespace(&self) -> &str {
        match self {
            Payload::Ping(_) => ns::PING,
            Payload::Bind(_) => ns::BIND,
            Payload::Element(el) => el.ns(),
        }
    }

    /// The serialized form of the payload.
    pub fn to_element(&self) -> Element {
        match self {
            Payload::Ping(ping) => ping.to_element(),
            Payload::Bind(bind) => bind.to_element(),
            Payload::Element(el) => el.clone(),
        }
    }
}

impl From<Element> for Payload {
    fn from(other: Element) -> Self {
        Payload::Element(other)
    }
}

/// Parses the extension children of a stanza.
///
/// For each `(element, namespace)` pair, the first occurrence goes through
/// its registered provider (if any); further occurrences and elements
/// without a provider are preserved as generic elements, in declared
/// order. A provider that fails demotes its element to a generic one
/// instead of poisoning the whole stanza.
pub(crate) fn parse_payloads<F>(parent: &Element, skip: F) -> Vec<Payload>
where
    F: Fn(&Element) -> bool,
{
    let mut payloads = Vec::new();
    let mut typed_seen: HashSet<(String, String)> = HashSet::new();
    for child in parent.children() {
        if skip(child) {
            continue;
        }
        let key = (child.name().to_owned(), child.ns().to_owned());
        if !typed_seen.contains(&key) {
            if let Some(parse) = provider::lookup(&key.0, &key.1) {
                match parse(child) {
                    Ok(payload) => {
                        typed_seen.insert(key);
                        payloads.push(payload);
                        continue;
                    }
                    Err(e) => {
                        log::debug!(
                            "provider for ({}, {}) failed ({}), keeping generic element",
                            key.0,
                            key.1,
                            e
                        );
                    }
                }
            }
        }
        payloads.push(Payload::Element(child.clone()));
    }
    payloads
}

/// A decoded top-level stream element.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// `<stream:features/>`
    Features(StreamFeatures),
    /// `<stream:error/>`
    StreamError(StreamError),
    /// `<proceed/>` in the TLS namespace
    TlsProceed,
    /// `<failure/>` in the TLS namespace
    TlsFailure,
    /// `<challenge/>` with its decoded payload
    Challenge(Vec<u8>),
    /// `<success/>` with its decoded payload (empty when absent)
    Success(Vec<u8>),
    /// `<failure/>` in the SASL namespace
    SaslFailure(sasl::SaslFailure),
    /// An IQ, message or presence stanza
    Stanza(Stanza),
    /// Any other element, preserved as-is
    Other(Element),
}

impl StreamItem {
    pub(crate) fn parse(element: Element) -> Result<StreamItem, ParseError> {
        let name = element.name().to_owned();
        let namespace = element.ns().to_owned();
        Ok(match (name.as_str(), namespace.as_str()) {
            ("features", ns::STREAM) => {
                StreamItem::Features(StreamFeatures::from_element(&element))
            }
            ("error", ns::STREAM) => {
                StreamItem::StreamError(StreamError::from_element(&element))
            }
            ("proceed", ns::TLS) => StreamItem::TlsProceed,
            ("failure", ns::TLS) => StreamItem::TlsFailure,
            ("challenge", ns::SASL) => StreamItem::Challenge(sasl::decode_payload(&element)?),
            ("success", ns::SASL) => StreamItem::Success(sasl::decode_payload(&element)?),
            ("failure", ns::SASL) => {
                StreamItem::SaslFailure(sasl::SaslFailure::from_element(&element))
            }
            ("iq", ns::CLIENT) => StreamItem::Stanza(Stanza::Iq(Iq::from_element(&element)?)),
            ("message", ns::CLIENT) => {
                StreamItem::Stanza(Stanza::Message(Message::from_element(&element)))
            }
            ("presence", ns::CLIENT) => {
                StreamItem::Stanza(Stanza::Presence(Presence::from_element(&element)))
            }
            _ => StreamItem::Other(element),
        })
    }

    /// A short description for diagnostics.
    pub(crate) fn name(&self) -> String {
        match self {
            StreamItem::Features(_) => "stream:features".to_owned(),
            StreamItem::StreamError(_) => "stream:error".to_owned(),
            StreamItem::TlsProceed => "proceed".to_owned(),
            StreamItem::TlsFailure => "failure".to_owned(),
            StreamItem::Challenge(_) => "challenge".to_owned(),
            StreamItem::Success(_) => "success".to_owned(),
            StreamItem::SaslFailure(_) => "failure".to_owned(),
            StreamItem::Stanza(Stanza::Iq(_)) => "iq".to_owned(),
            StreamItem::Stanza(Stanza::Message(_)) => "message".to_owned(),
            StreamItem::Stanza(Stanza::Presence(_)) => "presence".to_owned(),
            StreamItem::Other(el) => el.name().to_owned(),
        }
    }
}

pub(crate) fn parse_jid_attr(element: &Element, name: &str) -> Option<crate::jid::Jid> {
    let value = element.attr(name)?;
    match value.parse() {
        Ok(jid) => Some(jid),
        Err(e) => {
            log::debug!("dropping unparsable {} attribute {:?}: {}", name, value, e);
            None
        }
    }
}
