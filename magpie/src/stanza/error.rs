//! Stanza-level errors (`<error/>` children of IQ, message and presence).

use core::fmt;
use std::error::Error as StdError;

use crate::ns;
use crate::xml::Element;

/// An `<error/>` element carried inside a stanza.
///
/// Stanza errors end the request they belong to but are not fatal to the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaError {
    /// The `type` attribute (`cancel`, `modify`, `auth`, `wait`,
    /// `continue`).
    pub error_type: String,
    /// The defined condition, e.g. `service-unavailable`.
    pub condition: Option<String>,
    /// Optional human-readable text.
    pub text: Option<String>,
}

impl StanzaError {
    /// Creates a stanza error with the given type and defined condition.
    pub fn new<T: Into<String>, C: Into<String>>(error_type: T, condition: C) -> StanzaError {
        StanzaError {
            error_type: error_type.into(),
            condition: Some(condition.into()),
            text: None,
        }
    }

    /// Creates a `cancel` error, the most common kind.
    pub fn cancel<C: Into<String>>(condition: C) -> StanzaError {
        StanzaError::new("cancel", condition)
    }

    /// Attaches human-readable text.
    pub fn with_text<T: Into<String>>(mut self, text: T) -> StanzaError {
        self.text = Some(text.into());
        self
    }

    pub(crate) fn from_element(element: &Element) -> StanzaError {
        let mut condition = None;
        let mut text = None;
        for child in element.children() {
            if child.ns() != ns::STANZAS {
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
        StanzaError {
            error_type: element.attr("type").unwrap_or("cancel").to_owned(),
            condition,
            text,
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut error = Element::new("error", ns::CLIENT);
        error.set_attr("type", self.error_type.clone());
        if let Some(ref condition) = self.condition {
            error.append_child(Element::new(condition.clone(), ns::STANZAS));
        }
        if let Some(ref text) = self.text {
            error.append_child(
                Element::builder("text", ns::STANZAS).text(text).build(),
            );
        }
        error
    }
}

impl fmt::Display for StanzaError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.condition {
            Some(ref condition) => write!(fmt, "{} ({})", condition, self.error_type)?,
            None => write!(fmt, "undefined-condition ({})", self.error_type)?,
        }
        if let Some(ref text) = self.text {
            write!(fmt, ": {}", text)?;
        }
        Ok(())
    }
}

impl StdError for StanzaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let error = StanzaError::cancel("service-unavailable").with_text("try again later");
        let reparsed = StanzaError::from_element(&error.to_element());
        assert_eq!(error, reparsed);
    }

    #[test]
    fn parses_condition_and_text() {
        let el = Element::builder("error", ns::CLIENT)
            .attr("type", "wait")
            .append(Element::new("resource-constraint", ns::STANZAS))
            .append(
                Element::builder("text", ns::STANZAS)
                    .text("overloaded")
                    .build(),
            )
            .build();
        let error = StanzaError::from_element(&el);
        assert_eq!(error.error_type, "wait");
        assert_eq!(error.condition.as_deref(), Some("resource-constraint"));
        assert_eq!(error.text.as_deref(), Some("overloaded"));
    }
}
