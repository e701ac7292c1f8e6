//! XML namespaces used by RFC 6120 and the XEPs this crate implements.

/// `http://etherx.jabber.org/streams`, the stream framing namespace.
pub const STREAM: &str = "http://etherx.jabber.org/streams";

/// `jabber:client`, the default namespace of client-to-server streams.
pub const CLIENT: &str = "jabber:client";

/// `urn:ietf:params:xml:ns:xmpp-tls`, STARTTLS negotiation.
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// `urn:ietf:params:xml:ns:xmpp-sasl`, SASL negotiation.
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// `urn:ietf:params:xml:ns:xmpp-bind`, resource binding.
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// `urn:ietf:params:xml:ns:xmpp-streams`, stream error conditions.
pub const STREAM_ERRORS: &str = "urn:ietf:params:xml:ns:xmpp-streams";

/// `urn:ietf:params:xml:ns:xmpp-stanzas`, stanza error conditions.
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// `urn:xmpp:ping`, XEP-0199 pings.
pub const PING: &str = "urn:xmpp:ping";

/// `http://www.w3.org/XML/1998/namespace`, the `xml:` prefix.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
