//! SASL nonzas (`urn:ietf:params:xml:ns:xmpp-sasl`).

use core::fmt;

use base64::prelude::*;

use crate::error::ParseError;
use crate::ns;
use crate::xml::Element;

/// Decoded `<failure/>` from the SASL namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslFailure {
    /// The defined condition, e.g. `not-authorized`.
    pub condition: Option<String>,
    /// Optional human-readable text.
    pub text: Option<String>,
}

impl SaslFailure {
    pub(crate) fn from_element(element: &Element) -> SaslFailure {
        let mut condition = None;
        let mut text = None;
        for child in element.children() {
            if child.ns() != ns::SASL {
                continue;
            }
            if child.name() == "text" {
                let t = child.text();
                if !t.is_empty() {
                    text = Some(t);
                }
            } else if condition.is_none() {
                condition = Some(child.name().to_owned());
            }
        }
        SaslFailure { condition, text }
    }
}

impl fmt::Display for SaslFailure {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.condition {
            Some(ref condition) => fmt.write_str(condition)?,
            None => fmt.write_str("unspecified SASL failure")?,
        }
        if let Some(ref text) = self.text {
            write!(fmt, ": {}", text)?;
        }
        Ok(())
    }
}

/// Builds an `<auth/>` nonza carrying the mechanism's initial response.
///
/// An empty initial response is transmitted as `=` per RFC 6120 § 6.4.2.
pub(crate) fn auth(mechanism: &str, initial: &[u8]) -> Element {
    Element::builder("auth", ns::SASL)
        .attr("mechanism", mechanism)
        .text(encode_payload(initial))
        .build()
}

/// Builds a `<response/>` nonza.
pub(crate) fn response(data: &[u8]) -> Element {
    Element::builder("response", ns::SASL)
        .text(encode_payload(data))
        .build()
}

fn encode_payload(data: &[u8]) -> String {
    if data.is_empty() {
        "=".to_owned()
    } else {
        BASE64_STANDARD.encode(data)
    }
}

/// Decodes the text payload of a SASL nonza; `=` and empty text both mean
/// an empty payload.
pub(crate) fn decode_payload(element: &Element) -> Result<Vec<u8>, ParseError> {
    let text = element.text();
    if text.is_empty() || text == "=" {
        return Ok(Vec::new());
    }
    Ok(BASE64_STANDARD.decode(text.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_nonza() {
        let el = auth("PLAIN", b"\0juliet\0pencil");
        assert_eq!(
            el.to_string(),
            "<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' \
             mechanism='PLAIN'>AGp1bGlldABwZW5jaWw=</auth>"
        );
    }

    #[test]
    fn empty_initial_response_is_equals_sign() {
        let el = auth("EXTERNAL", b"");
        assert_eq!(el.text(), "=");
        assert_eq!(decode_payload(&el).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn payload_round_trip() {
        let el = response(b"c=biws,r=abc,p=xyz");
        assert_eq!(decode_payload(&el).unwrap(), b"c=biws,r=abc,p=xyz");
    }

    #[test]
    fn failure_parsing() {
        let el = Element::builder("failure", ns::SASL)
            .append(Element::new("not-authorized", ns::SASL))
            .build();
        let failure = SaslFailure::from_element(&el);
        assert_eq!(failure.condition.as_deref(), Some("not-authorized"));
    }
}
