//! Presence stanzas.

use crate::jid::Jid;
use crate::ns;
use crate::stanza::error::StanzaError;
use crate::stanza::{parse_jid_attr, parse_payloads, Payload};
use crate::xml::Element;

/// The `type` attribute of a presence stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceType {
    /// No `type` attribute: the entity is available.
    #[default]
    Available,
    /// The entity is going offline.
    Unavailable,
    /// Subscription request.
    Subscribe,
    /// Subscription approval.
    Subscribed,
    /// Unsubscribe request.
    Unsubscribe,
    /// Subscription cancellation.
    Unsubscribed,
    /// The server probes for current presence.
    Probe,
    /// A bounced presence.
    Error,
}

impl PresenceType {
    fn as_attr(&self) -> Option<&'static str> {
        match self {
            PresenceType::Available => None,
            PresenceType::Unavailable => Some("unavailable"),
            PresenceType::Subscribe => Some("subscribe"),
            PresenceType::Subscribed => Some("subscribed"),
            PresenceType::Unsubscribe => Some("unsubscribe"),
            PresenceType::Unsubscribed => Some("unsubscribed"),
            PresenceType::Probe => Some("probe"),
            PresenceType::Error => Some("error"),
        }
    }

    fn from_attr(value: Option<&str>) -> PresenceType {
        match value {
            Some("unavailable") => PresenceType::Unavailable,
            Some("subscribe") => PresenceType::Subscribe,
            Some("subscribed") => PresenceType::Subscribed,
            Some("unsubscribe") => PresenceType::Unsubscribe,
            Some("unsubscribed") => PresenceType::Unsubscribed,
            Some("probe") => PresenceType::Probe,
            Some("error") => PresenceType::Error,
            _ => PresenceType::Available,
        }
    }
}

/// The `<show/>` availability sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Show {
    /// Temporarily away.
    Away,
    /// Interested in chatting.
    Chat,
    /// Do not disturb.
    Dnd,
    /// Extended away.
    Xa,
}

impl Show {
    fn as_str(&self) -> &'static str {
        match self {
            Show::Away => "away",
            Show::Chat => "chat",
            Show::Dnd => "dnd",
            Show::Xa => "xa",
        }
    }

    fn from_text(text: &str) -> Option<Show> {
        match text {
            "away" => Some(Show::Away),
            "chat" => Some(Show::Chat),
            "dnd" => Some(Show::Dnd),
            "xa" => Some(Show::Xa),
            _ => None,
        }
    }
}

/// A presence stanza.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    /// The stanza ID.
    pub id: Option<String>,
    /// Sender.
    pub from: Option<Jid>,
    /// Addressee; broadcast when absent.
    pub to: Option<Jid>,
    /// The presence type.
    pub typ: PresenceType,
    /// Availability sub-state.
    pub show: Option<Show>,
    /// Free-form status text.
    pub status: Option<String>,
    /// Priority of this resource, `-128..=127`.
    pub priority: Option<i8>,
    /// Other extension children in declared order.
    pub payloads: Vec<Payload>,
    /// The error of a `type="error"` bounce.
    pub error: Option<StanzaError>,
}

impl Presence {
    /// The empty available presence sent when a session starts.
    pub fn available() -> Presence {
        Presence::default()
    }

    pub(crate) fn from_element(element: &Element) -> Presence {
        let show = element
            .get_child("show", ns::CLIENT)
            .and_then(|el| Show::from_text(&el.text()));
        let status = element.get_child("status", ns::CLIENT).map(|el| el.text());
        let priority = element
            .get_child("priority", ns::CLIENT)
            .and_then(|el| el.text().parse().ok());
        let error = element
            .get_child("error", ns::CLIENT)
            .map(StanzaError::from_element);
        let payloads = parse_payloads(element, |child| {
            child.ns() == ns::CLIENT
                && matches!(child.name(), "show" | "status" | "priority" | "error")
        });
        Presence {
            id: element.attr("id").map(str::to_owned),
            from: parse_jid_attr(element, "from"),
            to: parse_jid_attr(element, "to"),
            typ: PresenceType::from_attr(element.attr("type")),
            show,
            status,
            priority,
            payloads,
            error,
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut presence = Element::new("presence", ns::CLIENT);
        if let Some(typ) = self.typ.as_attr() {
            presence.set_attr("type", typ);
        }
        if let Some(ref id) = self.id {
            presence.set_attr("id", id.clone());
        }
        if let Some(ref from) = self.from {
            presence.set_attr("from", from.to_string());
        }
        if let Some(ref to) = self.to {
            presence.set_attr("to", to.to_string());
        }
        if let Some(show) = self.show {
            presence.append_child(Element::builder("show", ns::CLIENT).text(show.as_str()).build());
        }
        if let Some(ref status) = self.status {
            presence.append_child(Element::builder("status", ns::CLIENT).text(status).build());
        }
        if let Some(priority) = self.priority {
            presence.append_child(
                Element::builder("priority", ns::CLIENT)
                    .text(priority.to_string())
                    .build(),
            );
        }
        for payload in &self.payloads {
            presence.append_child(payload.to_element());
        }
        if let Some(ref error) = self.error {
            presence.append_child(error.to_element());
        }
        presence
    }
}
