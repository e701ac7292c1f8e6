//! A minimal owned XML tree.
//!
//! This is the "generic element" representation: whatever the typed layers
//! do not understand is kept as an [`Element`] so that no inbound data is
//! silently dropped.

use core::fmt;

mod tree_builder;

pub(crate) use tree_builder::TreeBuilder;

/// A child node of an [`Element`].
#[derive(Debug, Clone)]
pub enum Node {
    /// A child element.
    Element(Element),
    /// Character data.
    Text(String),
}

/// An XML element: name, namespace, attributes and children in document
/// order.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    namespace: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Creates an empty element.
    pub fn new<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> Element {
        Element {
            name: name.into(),
            namespace: namespace.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Starts building an element.
    pub fn builder<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> ElementBuilder {
        ElementBuilder {
            element: Element::new(name, namespace),
        }
    }

    /// The local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved namespace.
    pub fn ns(&self) -> &str {
        &self.namespace
    }

    /// Whether this element has the given name and namespace.
    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace == namespace
    }

    /// The value of the given attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attr<V: Into<String>>(&mut self, name: &str, value: V) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.into(),
            None => self.attributes.push((name.to_owned(), value.into())),
        }
    }

    /// The attributes in declared order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Appends a child element.
    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Appends character data.
    pub fn append_text(&mut self, text: &str) {
        self.children.push(Node::Text(text.to_owned()));
    }

    /// The child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// The first child with the given name and namespace.
    pub fn get_child(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.children().find(|child| child.is(name, namespace))
    }

    /// The element's own character data, concatenated and trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_owned()
    }

    /// Removes and returns the first completed child element, discarding
    /// any character data in front of it (whitespace keep-alives).
    pub(crate) fn take_first_child(&mut self) -> Option<Element> {
        match self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(_)))
        {
            Some(pos) => {
                self.children.drain(..pos);
                match self.children.remove(0) {
                    Node::Element(el) => Some(el),
                    Node::Text(_) => None,
                }
            }
            None => {
                self.children.clear();
                None
            }
        }
    }

    /// Serializes the element. `parent_ns` is the namespace in scope at the
    /// parent; an `xmlns` declaration is emitted only when this element's
    /// namespace differs from it.
    pub fn write_xml(&self, out: &mut String, parent_ns: &str) -> fmt::Result {
        use fmt::Write;

        write!(out, "<{}", self.name)?;
        if self.namespace != parent_ns && !self.namespace.is_empty() {
            write!(out, " xmlns='{}'", escape(&self.namespace))?;
        }
        for (name, value) in &self.attributes {
            write!(out, " {}='{}'", name, escape(value))?;
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return Ok(());
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(el) => el.write_xml(out, &self.namespace)?,
                Node::Text(t) => out.push_str(&escape(t)),
            }
        }
        write!(out, "</{}>", self.name)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut out = String::new();
        self.write_xml(&mut out, "")?;
        fmt.write_str(&out)
    }
}

/// Equivalence modulo attribute order and whitespace-only character data.
impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        if self.name != other.name || self.namespace != other.namespace {
            return false;
        }
        if self.attributes.len() != other.attributes.len() {
            return false;
        }
        if !self
            .attrs()
            .all(|(name, value)| other.attr(name) == Some(value))
        {
            return false;
        }
        let mine = meaningful_nodes(&self.children);
        let theirs = meaningful_nodes(&other.children);
        mine == theirs
    }
}

impl Eq for Element {}

#[derive(PartialEq)]
enum MeaningfulNode<'a> {
    Element(&'a Element),
    Text(&'a str),
}

fn meaningful_nodes(nodes: &[Node]) -> Vec<MeaningfulNode<'_>> {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Element(el) => Some(MeaningfulNode::Element(el)),
            Node::Text(t) => {
                let trimmed = t.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(MeaningfulNode::Text(trimmed))
                }
            }
        })
        .collect()
}

/// Builder for [`Element`].
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    /// Sets an attribute.
    pub fn attr<V: Into<String>>(mut self, name: &str, value: V) -> ElementBuilder {
        self.element.set_attr(name, value);
        self
    }

    /// Appends a child element.
    pub fn append(mut self, child: Element) -> ElementBuilder {
        self.element.append_child(child);
        self
    }

    /// Appends character data.
    pub fn text<T: AsRef<str>>(mut self, text: T) -> ElementBuilder {
        self.element.append_text(text.as_ref());
        self
    }

    /// Finishes the element.
    pub fn build(self) -> Element {
        self.element
    }
}

/// Escapes text for use in element content and single-quoted attribute
/// values.
pub(crate) fn escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            o => result.push(o),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_display() {
        let el = Element::builder("message", "jabber:client")
            .attr("type", "chat")
            .append(
                Element::builder("body", "jabber:client")
                    .text("Art thou not Romeo, & a Montague?")
                    .build(),
            )
            .build();
        assert_eq!(
            el.to_string(),
            "<message xmlns='jabber:client' type='chat'>\
             <body>Art thou not Romeo, &amp; a Montague?</body></message>"
        );
    }

    #[test]
    fn no_redundant_xmlns_for_inherited_namespace() {
        let el = Element::builder("iq", "jabber:client")
            .attr("type", "result")
            .attr("id", "p1")
            .build();
        let mut out = String::new();
        el.write_xml(&mut out, "jabber:client").unwrap();
        assert_eq!(out, "<iq type='result' id='p1'/>");
    }

    #[test]
    fn child_in_other_namespace_declares_it() {
        let el = Element::builder("iq", "jabber:client")
            .append(Element::new("ping", "urn:xmpp:ping"))
            .build();
        let mut out = String::new();
        el.write_xml(&mut out, "jabber:client").unwrap();
        assert_eq!(out, "<iq><ping xmlns='urn:xmpp:ping'/></iq>");
    }

    #[test]
    fn attribute_escaping() {
        let el = Element::builder("presence", "jabber:client")
            .attr("from", "o'brien@example.com")
            .build();
        let mut out = String::new();
        el.write_xml(&mut out, "jabber:client").unwrap();
        assert_eq!(out, "<presence from='o&apos;brien@example.com'/>");
    }

    #[test]
    fn equality_ignores_attribute_order_and_whitespace() {
        let a = Element::builder("x", "ns")
            .attr("a", "1")
            .attr("b", "2")
            .text("  ")
            .append(Element::new("y", "ns"))
            .build();
        let b = Element::builder("x", "ns")
            .attr("b", "2")
            .attr("a", "1")
            .append(Element::new("y", "ns"))
            .build();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_respects_child_order() {
        let a = Element::builder("x", "ns")
            .append(Element::new("y", "ns"))
            .append(Element::new("z", "ns"))
            .build();
        let b = Element::builder("x", "ns")
            .append(Element::new("z", "ns"))
            .append(Element::new("y", "ns"))
            .build();
        assert_ne!(a, b);
    }

    #[test]
    fn text_is_trimmed() {
        let mut el = Element::new("status", "jabber:client");
        el.append_text("  away for a while\n");
        assert_eq!(el.text(), "away for a while");
    }
}
