//! Message stanzas.

use crate::jid::Jid;
use crate::ns;
use crate::stanza::error::StanzaError;
use crate::stanza::{parse_jid_attr, parse_payloads, Payload};
use crate::xml::Element;

/// The `type` attribute of a message stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    /// One-to-one chat.
    Chat,
    /// Multi-user chat.
    Groupchat,
    /// Broadcast-style notification.
    Headline,
    /// A standalone message; the default.
    #[default]
    Normal,
    /// A bounced message.
    Error,
}

impl MessageType {
    fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Groupchat => "groupchat",
            MessageType::Headline => "headline",
            MessageType::Normal => "normal",
            MessageType::Error => "error",
        }
    }

    fn from_attr(value: Option<&str>) -> MessageType {
        match value {
            Some("chat") => MessageType::Chat,
            Some("groupchat") => MessageType::Groupchat,
            Some("headline") => MessageType::Headline,
            Some("error") => MessageType::Error,
            // RFC 6121 § 5.2.2: unknown and absent types are `normal`.
            _ => MessageType::Normal,
        }
    }
}

/// A message stanza.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// The stanza ID.
    pub id: Option<String>,
    /// Sender.
    pub from: Option<Jid>,
    /// Addressee.
    pub to: Option<Jid>,
    /// The message type.
    pub typ: MessageType,
    /// `xml:lang` of the stanza, if declared.
    pub lang: Option<String>,
    /// `<body/>` text.
    pub body: Option<String>,
    /// `<subject/>` text.
    pub subject: Option<String>,
    /// `<thread/>` identifier.
    pub thread: Option<String>,
    /// Other extension children in declared order.
    pub payloads: Vec<Payload>,
    /// The error of a `type="error"` bounce.
    pub error: Option<StanzaError>,
}

impl Message {
    /// Creates a chat message with a body.
    pub fn chat<B: Into<String>>(to: Jid, body: B) -> Message {
        Message {
            to: Some(to),
            typ: MessageType::Chat,
            body: Some(body.into()),
            ..Message::default()
        }
    }

    pub(crate) fn from_element(element: &Element) -> Message {
        let body = element.get_child("body", ns::CLIENT).map(|el| el.text());
        let subject = element.get_child("subject", ns::CLIENT).map(|el| el.text());
        let thread = element.get_child("thread", ns::CLIENT).map(|el| el.text());
        let error = element
            .get_child("error", ns::CLIENT)
            .map(StanzaError::from_element);
        let payloads = parse_payloads(element, |child| {
            child.ns() == ns::CLIENT
                && matches!(child.name(), "body" | "subject" | "thread" | "error")
        });
        Message {
            id: element.attr("id").map(str::to_owned),
            from: parse_jid_attr(element, "from"),
            to: parse_jid_attr(element, "to"),
            typ: MessageType::from_attr(element.attr("type")),
            lang: element.attr("xml:lang").map(str::to_owned),
            body,
            subject,
            thread,
            payloads,
            error,
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut message = Element::new("message", ns::CLIENT);
        if self.typ != MessageType::Normal {
            message.set_attr("type", self.typ.as_str());
        }
        if let Some(ref id) = self.id {
            message.set_attr("id", id.clone());
        }
        if let Some(ref from) = self.from {
            message.set_attr("from", from.to_string());
        }
        if let Some(ref to) = self.to {
            message.set_attr("to", to.to_string());
        }
        if let Some(ref lang) = self.lang {
            message.set_attr("xml:lang", lang.clone());
        }
        if let Some(ref subject) = self.subject {
            message.append_child(Element::builder("subject", ns::CLIENT).text(subject).build());
        }
        if let Some(ref body) = self.body {
            message.append_child(Element::builder("body", ns::CLIENT).text(body).build());
        }
        if let Some(ref thread) = self.thread {
            message.append_child(Element::builder("thread", ns::CLIENT).text(thread).build());
        }
        for payload in &self.payloads {
            message.append_child(payload.to_element());
        }
        if let Some(ref error) = self.error {
            message.append_child(error.to_element());
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let message = Message {
            id: Some("m1".to_owned()),
            to: Some("romeo@example.net".parse().unwrap()),
            typ: MessageType::Chat,
            body: Some("Wherefore art thou?".to_owned()),
            thread: Some("t1".to_owned()),
            ..Message::default()
        };
        let reparsed = Message::from_element(&message.to_element());
        assert_eq!(reparsed.typ, MessageType::Chat);
        assert_eq!(reparsed.body.as_deref(), Some("Wherefore art thou?"));
        assert_eq!(reparsed.thread.as_deref(), Some("t1"));
        assert_eq!(reparsed.to.unwrap().to_string(), "romeo@example.net");
    }

    #[test]
    fn default_type_is_normal_and_unserialized() {
        let message = Message::default();
        assert_eq!(message.to_element().attr("type"), None);
        let el = Element::builder("message", ns::CLIENT)
            .attr("type", "bogus")
            .build();
        assert_eq!(Message::from_element(&el).typ, MessageType::Normal);
    }

    #[test]
    fn unknown_children_are_preserved() {
        let el = Element::builder("message", ns::CLIENT)
            .append(Element::builder("body", ns::CLIENT).text("hi").build())
            .append(Element::new("active", "http://jabber.org/protocol/chatstates"))
            .build();
        let message = Message::from_element(&el);
        assert_eq!(message.body.as_deref(), Some("hi"));
        assert_eq!(message.payloads.len(), 1);
        assert_eq!(message.payloads[0].name(), "active");
    }
}
