//! Stream-level control elements: `<stream:features/>` and
//! `<stream:error/>`.

use core::fmt;
use std::error::Error as StdError;

use crate::ns;
use crate::xml::Element;

/// Decoded `<stream:features/>`, usually the very first nonza of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFeatures {
    /// The server offers `<starttls/>`.
    pub starttls_available: bool,
    /// The server marked STARTTLS as `<required/>`.
    pub starttls_required: bool,
    /// SASL mechanism names offered by the server, in server order.
    pub mechanisms: Vec<String>,
    /// The server offers resource binding.
    pub bind_available: bool,
}

impl StreamFeatures {
    pub(crate) fn from_element(element: &Element) -> StreamFeatures {
        let starttls = element.get_child("starttls", ns::TLS);
        let mechanisms = element
            .get_child("mechanisms", ns::SASL)
            .map(|mechs| {
                mechs
                    .children()
                    .filter(|child| child.is("mechanism", ns::SASL))
                    .map(|mech| mech.text())
                    .collect()
            })
            .unwrap_or_default();
        StreamFeatures {
            starttls_available: starttls.is_some(),
            starttls_required: starttls
                .map(|tls| tls.get_child("required", ns::TLS).is_some())
                .unwrap_or(false),
            mechanisms,
            bind_available: element.get_child("bind", ns::BIND).is_some(),
        }
    }
}

/// Defined conditions of `<stream:error/>` (RFC 6120 § 4.9.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamErrorCondition {
    /// `bad-format`
    BadFormat,
    /// `bad-namespace-prefix`
    BadNamespacePrefix,
    /// `conflict`
    Conflict,
    /// `connection-timeout`
    ConnectionTimeout,
    /// `host-gone`
    HostGone,
    /// `host-unknown`
    HostUnknown,
    /// `improper-addressing`
    ImproperAddressing,
    /// `internal-server-error`
    InternalServerError,
    /// `invalid-from`
    InvalidFrom,
    /// `invalid-namespace`
    InvalidNamespace,
    /// `invalid-xml`
    InvalidXml,
    /// `not-authorized`
    NotAuthorized,
    /// `not-well-formed`
    NotWellFormed,
    /// `policy-violation`
    PolicyViolation,
    /// `remote-connection-failed`
    RemoteConnectionFailed,
    /// `reset`
    Reset,
    /// `resource-constraint`
    ResourceConstraint,
    /// `restricted-xml`
    RestrictedXml,
    /// `see-other-host`
    SeeOtherHost,
    /// `system-shutdown`
    SystemShutdown,
    /// `undefined-condition`
    UndefinedCondition,
    /// `unsupported-encoding`
    UnsupportedEncoding,
    /// `unsupported-feature`
    UnsupportedFeature,
    /// `unsupported-stanza-type`
    UnsupportedStanzaType,
    /// `unsupported-version`
    UnsupportedVersion,
    /// A condition this crate does not know about.
    Other(String),
}

impl StreamErrorCondition {
    fn from_name(name: &str) -> StreamErrorCondition {
        use StreamErrorCondition::*;
        match name {
            "bad-format" => BadFormat,
            "bad-namespace-prefix" => BadNamespacePrefix,
            "conflict" => Conflict,
            "connection-timeout" => ConnectionTimeout,
            "host-gone" => HostGone,
            "host-unknown" => HostUnknown,
            "improper-addressing" => ImproperAddressing,
            "internal-server-error" => InternalServerError,
            "invalid-from" => InvalidFrom,
            "invalid-namespace" => InvalidNamespace,
            "invalid-xml" => InvalidXml,
            "not-authorized" => NotAuthorized,
            "not-well-formed" => NotWellFormed,
            "policy-violation" => PolicyViolation,
            "remote-connection-failed" => RemoteConnectionFailed,
            "reset" => Reset,
            "resource-constraint" => ResourceConstraint,
            "restricted-xml" => RestrictedXml,
            "see-other-host" => SeeOtherHost,
            "system-shutdown" => SystemShutdown,
            "undefined-condition" => UndefinedCondition,
            "unsupported-encoding" => UnsupportedEncoding,
            "unsupported-feature" => UnsupportedFeature,
            "unsupported-stanza-type" => UnsupportedStanzaType,
            "unsupported-version" => UnsupportedVersion,
            other => Other(other.to_owned()),
        }
    }

    /// The kebab-case wire name of the condition.
    pub fn as_str(&self) -> &str {
        use StreamErrorCondition::*;
        match self {
            BadFormat => "bad-format",
            BadNamespacePrefix => "bad-namespace-prefix",
            Conflict => "conflict",
            ConnectionTimeout => "connection-timeout",
            HostGone => "host-gone",
            HostUnknown => "host-unknown",
            ImproperAddressing => "improper-addressing",
            InternalServerError => "internal-server-error",
            InvalidFrom => "invalid-from",
            InvalidNamespace => "invalid-namespace",
            InvalidXml => "invalid-xml",
            NotAuthorized => "not-authorized",
            NotWellFormed => "not-well-formed",
            PolicyViolation => "policy-violation",
            RemoteConnectionFailed => "remote-connection-failed",
            Reset => "reset",
            ResourceConstraint => "resource-constraint",
            RestrictedXml => "restricted-xml",
            SeeOtherHost => "see-other-host",
            SystemShutdown => "system-shutdown",
            UndefinedCondition => "undefined-condition",
            UnsupportedEncoding => "unsupported-encoding",
            UnsupportedFeature => "unsupported-feature",
            UnsupportedStanzaType => "unsupported-stanza-type",
            UnsupportedVersion => "unsupported-version",
            Other(name) => name,
        }
    }
}

impl fmt::Display for StreamErrorCondition {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Decoded `<stream:error/>`. Always fatal to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    /// The defined condition.
    pub condition: StreamErrorCondition,
    /// Optional human-readable text.
    pub text: Option<String>,
    /// The entity that reported the error (`by` attribute of the text
    /// sibling per RFC 6120, rarely present).
    pub by: Option<String>,
}

impl StreamError {
    pub(crate) fn from_element(element: &Element) -> StreamError {
        let mut condition = StreamErrorCondition::UndefinedCondition;
        let mut text = None;
        let mut by = None;
        for child in element.children() {
            if child.ns() != ns::STREAM_ERRORS {
                continue;
            }
            if child.name() == "text" {
                let t = child.text();
                if !t.is_empty() {
                    text = Some(t);
                }
                by = child.attr("by").map(str::to_owned).or(by);
            } else {
                condition = StreamErrorCondition::from_name(child.name());
            }
        }
        StreamError {
            condition,
            text,
            by,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.condition)?;
        if let Some(ref text) = self.text {
            write!(fmt, ": {}", text)?;
        }
        if let Some(ref by) = self.by {
            write!(fmt, " (by {})", by)?;
        }
        Ok(())
    }
}

impl StdError for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_with_everything() {
        let el = Element::builder("features", ns::STREAM)
            .append(
                Element::builder("starttls", ns::TLS)
                    .append(Element::new("required", ns::TLS))
                    .build(),
            )
            .append(
                Element::builder("mechanisms", ns::SASL)
                    .append(
                        Element::builder("mechanism", ns::SASL)
                            .text("SCRAM-SHA-256")
                            .build(),
                    )
                    .append(Element::builder("mechanism", ns::SASL).text("PLAIN").build())
                    .build(),
            )
            .append(Element::new("bind", ns::BIND))
            .build();
        let features = StreamFeatures::from_element(&el);
        assert!(features.starttls_available);
        assert!(features.starttls_required);
        assert_eq!(features.mechanisms, vec!["SCRAM-SHA-256", "PLAIN"]);
        assert!(features.bind_available);
    }

    #[test]
    fn empty_features() {
        let el = Element::new("features", ns::STREAM);
        let features = StreamFeatures::from_element(&el);
        assert_eq!(features, StreamFeatures::default());
    }

    #[test]
    fn stream_error_condition_and_text() {
        let el = Element::builder("error", ns::STREAM)
            .append(Element::new("system-shutdown", ns::STREAM_ERRORS))
            .append(
                Element::builder("text", ns::STREAM_ERRORS)
                    .text("going down for maintenance")
                    .build(),
            )
            .build();
        let error = StreamError::from_element(&el);
        assert_eq!(error.condition, StreamErrorCondition::SystemShutdown);
        assert_eq!(error.text.as_deref(), Some("going down for maintenance"));
    }
}
