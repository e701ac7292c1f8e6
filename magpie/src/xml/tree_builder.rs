//! Assembles [`Element`] trees from namespace-resolved parser events.

use rxml::{Event, Namespace};

use crate::error::ParseError;
use crate::ns;
use crate::xml::Element;

/// Incremental tree builder.
///
/// The outermost open element (the `<stream:stream>` document root) lives at
/// the bottom of the stack for the whole lifetime of the stream; completed
/// top-level children accumulate on it until the caller collects them with
/// [`take_first_child`][`TreeBuilder::take_first_child`].
pub(crate) struct TreeBuilder {
    stack: Vec<Element>,
    /// Set once the document root itself is closed.
    pub(crate) root_closed: Option<Element>,
}

impl TreeBuilder {
    pub(crate) fn new() -> TreeBuilder {
        TreeBuilder {
            stack: Vec::new(),
            root_closed: None,
        }
    }

    /// Number of currently open elements, the document root included.
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost open element.
    pub(crate) fn top(&self) -> Option<&Element> {
        self.stack.last()
    }

    /// Removes and returns the first completed top-level child.
    pub(crate) fn take_first_child(&mut self) -> Option<Element> {
        self.stack.first_mut()?.take_first_child()
    }

    pub(crate) fn process_event(&mut self, event: Event) -> Result<(), ParseError> {
        match event {
            Event::XmlDeclaration(_, _) => {}
            Event::StartElement(_, (namespace, name), attrs) => {
                let mut element = Element::new(name.to_string(), namespace.to_string());
                for ((attr_ns, attr_name), value) in attrs.into_iter() {
                    let key = if attr_ns == *Namespace::none() {
                        attr_name.to_string()
                    } else if attr_ns == ns::XML {
                        format!("xml:{}", attr_name)
                    } else {
                        format!("{}:{}", attr_ns, attr_name)
                    };
                    element.set_attr(&key, value.to_string());
                }
                self.stack.push(element);
            }
            Event::Text(_, text) => {
                if let Some(top) = self.stack.last_mut() {
                    top.append_text(&text);
                }
            }
            Event::EndElement(_) => {
                let Some(element) = self.stack.pop() else {
                    return Err(ParseError::InvalidStanza("unbalanced end element"));
                };
                match self.stack.last_mut() {
                    Some(parent) => parent.append_child(element),
                    None => self.root_closed = Some(element),
                }
            }
        }
        Ok(())
    }
}
