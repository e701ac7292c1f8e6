//! XEP-0199 ping payload.

use crate::error::ParseError;
use crate::ns;
use crate::stanza::Payload;
use crate::xml::Element;

/// The empty `<ping/>` payload of XEP-0199.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ping;

impl Ping {
    pub(crate) fn to_element(&self) -> Element {
        Element::new("ping", ns::PING)
    }
}

/// Provider entry for `(ping, urn:xmpp:ping)`.
pub(crate) fn provider(_element: &Element) -> Result<Payload, ParseError> {
    Ok(Payload::Ping(Ping))
}
