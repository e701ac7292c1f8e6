//! IQ stanzas.

use crate::error::ParseError;
use crate::jid::Jid;
use crate::ns;
use crate::stanza::error::StanzaError;
use crate::stanza::{parse_jid_attr, parse_payloads, Payload};
use crate::xml::Element;

/// The `type` attribute of an IQ stanza.
///
/// The wire form is always lowercase; parsing accepts any casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqType {
    /// A request for information.
    Get,
    /// A request to change state.
    Set,
    /// A successful reply.
    Result,
    /// A failure reply.
    Error,
}

impl IqType {
    /// The lowercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    fn from_attr(value: &str) -> Option<IqType> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Some(IqType::Get),
            "set" => Some(IqType::Set),
            "result" => Some(IqType::Result),
            "error" => Some(IqType::Error),
            _ => None,
        }
    }

    /// Whether this is a request (`get` or `set`).
    pub fn is_request(&self) -> bool {
        matches!(self, IqType::Get | IqType::Set)
    }
}

/// An IQ stanza.
///
/// Every `get`/`set` request must be answered with a `result` or `error`
/// of the same ID; the [`Client`][`crate::Client`] enforces the pairing
/// for requests it sends.
#[derive(Debug, Clone)]
pub struct Iq {
    /// The stanza ID. Required on the wire for requests; filled in
    /// automatically when sending.
    pub id: Option<String>,
    /// Sender, usually absent on stanzas the client emits.
    pub from: Option<Jid>,
    /// Addressee; absent means the user's own server.
    pub to: Option<Jid>,
    /// The request/reply type.
    pub typ: IqType,
    /// Extension children in declared order.
    pub payloads: Vec<Payload>,
    /// The error of a `type="error"` reply.
    pub error: Option<StanzaError>,
}

impl Iq {
    /// Creates a `get` request with the given payload.
    pub fn get<P: Into<Payload>>(payload: P) -> Iq {
        Iq {
            id: None,
            from: None,
            to: None,
            typ: IqType::Get,
            payloads: vec![payload.into()],
            error: None,
        }
    }

    /// Creates a `set` request with the given payload.
    pub fn set<P: Into<Payload>>(payload: P) -> Iq {
        Iq {
            id: None,
            from: None,
            to: None,
            typ: IqType::Set,
            payloads: vec![payload.into()],
            error: None,
        }
    }

    /// Addresses the IQ.
    pub fn with_to(mut self, to: Jid) -> Iq {
        self.to = Some(to);
        self
    }

    /// Sets the stanza ID.
    pub fn with_id<I: Into<String>>(mut self, id: I) -> Iq {
        self.id = Some(id.into());
        self
    }

    /// Builds the `result` reply to `request`, addressed back to its
    /// sender.
    pub fn result_for(request: &Iq, payload: Option<Payload>) -> Iq {
        Iq {
            id: request.id.clone(),
            from: None,
            to: request.from.clone(),
            typ: IqType::Result,
            payloads: payload.into_iter().collect(),
            error: None,
        }
    }

    /// Builds the `error` reply to `request`, addressed back to its
    /// sender.
    pub fn error_for(request: &Iq, error: StanzaError) -> Iq {
        Iq {
            id: request.id.clone(),
            from: None,
            to: request.from.clone(),
            typ: IqType::Error,
            payloads: Vec::new(),
            error: Some(error),
        }
    }

    /// The first payload, which for requests is conventionally the only
    /// one.
    pub fn payload(&self) -> Option<&Payload> {
        self.payloads.first()
    }

    pub(crate) fn from_element(element: &Element) -> Result<Iq, ParseError> {
        let typ = element
            .attr("type")
            .and_then(IqType::from_attr)
            .ok_or(ParseError::InvalidStanza("iq without a valid type"))?;
        let error = element
            .get_child("error", ns::CLIENT)
            .map(StanzaError::from_element);
        let payloads = parse_payloads(element, |child| child.is("error", ns::CLIENT));
        Ok(Iq {
            id: element.attr("id").map(str::to_owned),
            from: parse_jid_attr(element, "from"),
            to: parse_jid_attr(element, "to"),
            typ,
            payloads,
            error,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut iq = Element::new("iq", ns::CLIENT);
        iq.set_attr("type", self.typ.as_str());
        if let Some(ref id) = self.id {
            iq.set_attr("id", id.clone());
        }
        if let Some(ref from) = self.from {
            iq.set_attr("from", from.to_string());
        }
        if let Some(ref to) = self.to {
            iq.set_attr("to", to.to_string());
        }
        for payload in &self.payloads {
            iq.append_child(payload.to_element());
        }
        if let Some(ref error) = self.error {
            iq.append_child(error.to_element());
        }
        iq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::Ping;

    #[test]
    fn uppercase_type_is_normalized() {
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "GET")
            .attr("id", "q1")
            .build();
        let iq = Iq::from_element(&el).unwrap();
        assert_eq!(iq.typ, IqType::Get);
        assert_eq!(iq.to_element().attr("type"), Some("get"));
    }

    #[test]
    fn missing_type_is_rejected() {
        let el = Element::new("iq", ns::CLIENT);
        assert!(Iq::from_element(&el).is_err());
    }

    #[test]
    fn ping_child_is_typed() {
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "get")
            .attr("id", "p1")
            .append(Element::new("ping", ns::PING))
            .build();
        let iq = Iq::from_element(&el).unwrap();
        assert_eq!(iq.payload(), Some(&Payload::Ping(Ping)));
    }

    #[test]
    fn duplicate_typed_child_stays_generic() {
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "get")
            .append(Element::new("ping", ns::PING))
            .append(Element::new("ping", ns::PING))
            .build();
        let iq = Iq::from_element(&el).unwrap();
        assert_eq!(iq.payloads.len(), 2);
        assert_eq!(iq.payloads[0], Payload::Ping(Ping));
        assert!(matches!(iq.payloads[1], Payload::Element(_)));
    }

    #[test]
    fn unknown_child_is_preserved_generically() {
        let child = Element::builder("query", "jabber:iq:version")
            .append(Element::builder("name", "jabber:iq:version").text("magpie").build())
            .build();
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "result")
            .append(child.clone())
            .build();
        let iq = Iq::from_element(&el).unwrap();
        assert_eq!(iq.payload(), Some(&Payload::Element(child)));
    }

    #[test]
    fn result_reply_swaps_addresses() {
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "get")
            .attr("id", "p1")
            .attr("from", "im.example.com")
            .append(Element::new("ping", ns::PING))
            .build();
        let request = Iq::from_element(&el).unwrap();
        let reply = Iq::result_for(&request, None);
        assert_eq!(reply.id.as_deref(), Some("p1"));
        assert_eq!(reply.to.as_ref().unwrap().to_string(), "im.example.com");
        let mut out = String::new();
        reply.to_element().write_xml(&mut out, ns::CLIENT).unwrap();
        assert_eq!(out, "<iq type='result' id='p1' to='im.example.com'/>");
    }

    #[test]
    fn error_reply_carries_condition() {
        let el = Element::builder("iq", ns::CLIENT)
            .attr("type", "set")
            .attr("id", "s1")
            .attr("from", "romeo@example.net/garden")
            .build();
        let request = Iq::from_element(&el).unwrap();
        let reply = Iq::error_for(&request, StanzaError::cancel("service-unavailable"));
        let reparsed = Iq::from_element(&reply.to_element()).unwrap();
        assert_eq!(reparsed.typ, IqType::Error);
        assert_eq!(
            reparsed.error.unwrap().condition.as_deref(),
            Some("service-unavailable")
        );
    }
}
