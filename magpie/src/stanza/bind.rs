//! Resource binding payload (`urn:ietf:params:xml:ns:xmpp-bind`).

use crate::error::ParseError;
use crate::jid::Jid;
use crate::ns;
use crate::stanza::Payload;
use crate::xml::Element;

/// The `<bind/>` payload, used both to request a resource and to carry the
/// server-assigned full JID in the reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bind {
    /// The resource the client asks for; omitted to let the server pick.
    pub resource: Option<String>,
    /// The full JID assigned by the server (reply only).
    pub jid: Option<Jid>,
}

impl Bind {
    /// A bind request for the given resource.
    pub fn request(resource: Option<&str>) -> Bind {
        Bind {
            resource: resource.map(str::to_owned),
            jid: None,
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut bind = Element::new("bind", ns::BIND);
        if let Some(ref resource) = self.resource {
            bind.append_child(Element::builder("resource", ns::BIND).text(resource).build());
        }
        if let Some(ref jid) = self.jid {
            bind.append_child(
                Element::builder("jid", ns::BIND).text(jid.to_string()).build(),
            );
        }
        bind
    }
}

/// Provider entry for `(bind, urn:ietf:params:xml:ns:xmpp-bind)`.
pub(crate) fn provider(element: &Element) -> Result<Payload, ParseError> {
    let jid = match element.get_child("jid", ns::BIND) {
        Some(jid_el) => Some(
            jid_el
                .text()
                .parse()
                .map_err(|_| ParseError::InvalidStanza("unparsable jid in bind result"))?,
        ),
        None => None,
    };
    let resource = element
        .get_child("resource", ns::BIND)
        .map(|resource_el| resource_el.text());
    Ok(Payload::Bind(Bind { resource, jid }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_resource() {
        let el = Bind::request(Some("balcony")).to_element();
        assert_eq!(
            el.to_string(),
            "<bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
             <resource>balcony</resource></bind>"
        );
    }

    #[test]
    fn request_without_resource_is_empty() {
        let el = Bind::request(None).to_element();
        assert_eq!(el.to_string(), "<bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>");
    }

    #[test]
    fn parses_result_jid() {
        let el = Element::builder("bind", ns::BIND)
            .append(
                Element::builder("jid", ns::BIND)
                    .text("juliet@im.example.com/balcony")
                    .build(),
            )
            .build();
        let Payload::Bind(bind) = provider(&el).unwrap() else {
            panic!("expected bind payload");
        };
        assert_eq!(
            bind.jid.unwrap().to_string(),
            "juliet@im.example.com/balcony"
        );
    }
}
