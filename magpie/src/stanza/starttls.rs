//! STARTTLS nonzas (`urn:ietf:params:xml:ns:xmpp-tls`).

use crate::ns;
use crate::xml::Element;

/// Builds the `<starttls/>` request.
pub(crate) fn request() -> Element {
    Element::new("starttls", ns::TLS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form() {
        assert_eq!(
            request().to_string(),
            "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
        );
    }
}
