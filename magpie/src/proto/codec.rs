//! XML stream parser and serializer for XMPP.

use std::collections::HashMap;
use std::fmt::Write;

use bytes::BytesMut;
use log::debug;
use rxml::{Lexer, Parser, PushDriver};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, ParseError, ProtocolError};
use crate::ns;
use crate::stanza::StreamItem;
use crate::xml::{escape, Element, TreeBuilder};

/// A decoded inbound frame.
#[derive(Debug)]
pub enum Frame {
    /// The `<stream:stream>` opening tag with its attributes.
    StreamStart(HashMap<String, String>),
    /// A complete top-level child of the stream, classified.
    Item(StreamItem),
    /// The `</stream:stream>` closing tag.
    StreamEnd,
}

/// An outbound packet.
#[derive(Debug)]
pub enum Packet {
    /// The client's stream prologue. The XML declaration is prepended
    /// automatically on the first prologue of the TCP connection and
    /// omitted on restarts.
    StreamStart {
        /// The `to` attribute, i.e. the service domain.
        to: String,
        /// Optional `xml:lang`.
        lang: Option<String>,
    },
    /// A serialized element (stanza or nonza).
    Element(Element),
    /// The `</stream:stream>` closing tag.
    StreamEnd,
}

/// Stateful encoder/decoder for a bytestream from/to XMPP frames.
///
/// The decoder enforces a cap on the number of bytes a single top-level
/// element may span; the [`reset`][`XmppCodec::reset`] method discards all
/// parser state for the stream restarts mandated after STARTTLS and SASL.
pub struct XmppCodec {
    driver: PushDriver<Parser>,
    builder: TreeBuilder,
    max_frame_bytes: usize,
    /// Bytes consumed since the last emitted frame.
    frame_bytes: usize,
    watermark_warned: bool,
    xml_decl_sent: bool,
    resets: usize,
}

impl XmppCodec {
    /// Constructor. `max_frame_bytes` caps the wire size of a single
    /// top-level element.
    pub fn new(max_frame_bytes: usize) -> Self {
        XmppCodec {
            driver: PushDriver::wrap(Lexer::new(), Parser::default()),
            builder: TreeBuilder::new(),
            max_frame_bytes,
            frame_bytes: 0,
            watermark_warned: false,
            xml_decl_sent: false,
            resets: 0,
        }
    }

    /// Discards all parser state so that the next inbound bytes are parsed
    /// as a fresh stream prologue. Called after STARTTLS and after SASL
    /// success.
    pub fn reset(&mut self) {
        self.driver = PushDriver::wrap(Lexer::new(), Parser::default());
        self.builder = TreeBuilder::new();
        self.frame_bytes = 0;
        self.watermark_warned = false;
        self.resets += 1;
    }

    /// How often [`reset`][`XmppCodec::reset`] has been invoked.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Bytes consumed towards the element currently being parsed.
    pub fn retained_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn check_frame_cap(&mut self, buffered: usize) -> Result<(), Error> {
        let retained = self.frame_bytes + buffered;
        if retained > self.max_frame_bytes {
            return Err(ParseError::FramingOverflow.into());
        }
        if retained > self.max_frame_bytes / 2 && !self.watermark_warned {
            self.watermark_warned = true;
            log::warn!(
                "inbound element has grown to {} bytes, over half the {} byte frame cap",
                retained,
                self.max_frame_bytes
            );
        }
        Ok(())
    }
}

impl Default for XmppCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for XmppCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let before = buf.len();
            let token = match self.driver.parse(buf, false) {
                Ok(Some(token)) => {
                    self.frame_bytes += before - buf.len();
                    token
                }
                Ok(None) => {
                    self.frame_bytes += before - buf.len();
                    break;
                }
                Err(rxml::Error::IO(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.frame_bytes += before - buf.len();
                    break;
                }
                Err(e) => return Err(ParseError::Xml(e).into()),
            };
            self.check_frame_cap(buf.len())?;

            let had_stream_root = self.builder.depth() > 0;
            self.builder.process_event(token)?;
            let has_stream_root = self.builder.depth() > 0;

            if !had_stream_root && has_stream_root {
                let root = self
                    .builder
                    .top()
                    .ok_or(ProtocolError::InvalidStreamHeader)?;
                if !root.is("stream", ns::STREAM) {
                    return Err(ProtocolError::InvalidStreamHeader.into());
                }
                let attrs = root
                    .attrs()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect();
                debug!("<< <stream:stream> {:?}", attrs);
                self.frame_bytes = 0;
                return Ok(Some(Frame::StreamStart(attrs)));
            } else if self.builder.depth() == 1 {
                self.driver.release_temporaries();

                if let Some(element) = self.builder.take_first_child() {
                    debug!("<< {}", element);
                    self.frame_bytes = 0;
                    return Ok(Some(Frame::Item(StreamItem::parse(element)?)));
                }
            } else if self.builder.root_closed.take().is_some() {
                self.driver.release_temporaries();

                debug!("<< </stream:stream>");
                self.frame_bytes = 0;
                return Ok(Some(Frame::StreamEnd));
            }
        }

        self.check_frame_cap(buf.len())?;
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode(buf)
    }
}

impl Encoder<Packet> for XmppCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut xml = String::new();
        match item {
            Packet::StreamStart { to, lang } => {
                if !self.xml_decl_sent {
                    xml.push_str("<?xml version='1.0'?>");
                    self.xml_decl_sent = true;
                }
                write!(
                    xml,
                    "<stream:stream to='{}' xmlns='{}' xmlns:stream='{}' version='1.0'",
                    escape(&to),
                    ns::CLIENT,
                    ns::STREAM
                )?;
                if let Some(lang) = lang {
                    write!(xml, " xml:lang='{}'", escape(&lang))?;
                }
                xml.push('>');
            }
            Packet::Element(element) => {
                element.write_xml(&mut xml, ns::CLIENT)?;
            }
            Packet::StreamEnd => {
                xml.push_str("</stream:stream>");
            }
        }
        debug!(">> {}", xml);
        dst.extend_from_slice(xml.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::Stanza;
    use bytes::BufMut;

    const PROLOGUE: &[u8] = b"<?xml version='1.0'?><stream:stream \
        xmlns:stream='http://etherx.jabber.org/streams' version='1.0' \
        id='s1' from='im.example.com' xmlns='jabber:client'>";

    fn codec() -> XmppCodec {
        XmppCodec::new(crate::config::DEFAULT_MAX_FRAME_BYTES)
    }

    #[test]
    fn stream_start() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        let r = c.decode(&mut b);
        match r {
            Ok(Some(Frame::StreamStart(attrs))) => {
                assert_eq!(attrs.get("id").map(String::as_str), Some("s1"));
                assert_eq!(attrs.get("from").map(String::as_str), Some("im.example.com"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn stream_end() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));
        b.put_slice(b"</stream:stream>");
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamEnd))));
    }

    #[test]
    fn truncated_stanza() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        b.put_slice("<message type='chat'><body>ß</body></message".as_bytes());
        assert!(matches!(c.decode(&mut b), Ok(None)));

        b.put_slice(b">");
        match c.decode(&mut b) {
            Ok(Some(Frame::Item(StreamItem::Stanza(Stanza::Message(message))))) => {
                assert_eq!(message.body.as_deref(), Some("ß"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn truncated_utf8() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        b.put_slice(b"<message><body>\xc3");
        assert!(matches!(c.decode(&mut b), Ok(None)));

        b.put_slice(b"\x9f</body></message>");
        match c.decode(&mut b) {
            Ok(Some(Frame::Item(StreamItem::Stanza(Stanza::Message(message))))) => {
                assert_eq!(message.body.as_deref(), Some("ß"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn whitespace_keepalive_between_stanzas_is_ignored() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        b.put_slice(b" \n ");
        assert!(matches!(c.decode(&mut b), Ok(None)));

        b.put_slice(b"<presence/>");
        assert!(matches!(
            c.decode(&mut b),
            Ok(Some(Frame::Item(StreamItem::Stanza(Stanza::Presence(_)))))
        ));
    }

    #[test]
    fn features_are_classified() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        b.put_slice(
            b"<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>\
              <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
              <mechanism>SCRAM-SHA-256</mechanism><mechanism>PLAIN</mechanism>\
              </mechanisms></stream:features>",
        );
        match c.decode(&mut b) {
            Ok(Some(Frame::Item(StreamItem::Features(features)))) => {
                assert!(features.starttls_available);
                assert_eq!(features.mechanisms, vec!["SCRAM-SHA-256", "PLAIN"]);
                assert!(!features.bind_available);
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn reset_accepts_a_fresh_prologue() {
        let mut c = codec();
        let mut b = BytesMut::with_capacity(1024);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        c.reset();
        assert_eq!(c.reset_count(), 1);
        b.clear();
        b.put_slice(b"<?xml version='1.0'?><stream:stream \
            xmlns:stream='http://etherx.jabber.org/streams' version='1.0' \
            id='s2' xmlns='jabber:client'>");
        match c.decode(&mut b) {
            Ok(Some(Frame::StreamStart(attrs))) => {
                assert_eq!(attrs.get("id").map(String::as_str), Some("s2"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn framing_overflow() {
        let mut c = XmppCodec::new(1024);
        let mut b = BytesMut::with_capacity(8192);
        b.put_slice(PROLOGUE);
        assert!(matches!(c.decode(&mut b), Ok(Some(Frame::StreamStart(_)))));

        b.put_slice(b"<message><body>");
        for _ in 0..64 {
            b.put_slice(&[b'A'; 64]);
        }
        let mut overflowed = false;
        loop {
            match c.decode(&mut b) {
                Ok(None) => break,
                Ok(Some(_)) => {}
                Err(Error::Parse(ParseError::FramingOverflow)) => {
                    overflowed = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(overflowed);
    }

    #[test]
    fn xml_declaration_only_on_first_prologue() {
        let mut c = codec();
        let mut b = BytesMut::new();
        c.encode(
            Packet::StreamStart {
                to: "im.example.com".to_owned(),
                lang: Some("en".to_owned()),
            },
            &mut b,
        )
        .unwrap();
        let first = String::from_utf8(b.to_vec()).unwrap();
        assert_eq!(
            first,
            "<?xml version='1.0'?><stream:stream to='im.example.com' \
             xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
             version='1.0' xml:lang='en'>"
        );

        b.clear();
        c.reset();
        c.encode(
            Packet::StreamStart {
                to: "im.example.com".to_owned(),
                lang: None,
            },
            &mut b,
        )
        .unwrap();
        let second = String::from_utf8(b.to_vec()).unwrap();
        assert!(!second.contains("<?xml"));
        assert!(second.starts_with("<stream:stream to='im.example.com'"));
    }

    #[test]
    fn stanza_encoding_omits_stream_default_namespace() {
        let mut c = codec();
        let mut b = BytesMut::new();
        let iq = Element::builder("iq", ns::CLIENT)
            .attr("type", "result")
            .attr("id", "p1")
            .attr("to", "im.example.com")
            .build();
        c.encode(Packet::Element(iq), &mut b).unwrap();
        assert_eq!(
            String::from_utf8(b.to_vec()).unwrap(),
            "<iq type='result' id='p1' to='im.example.com'/>"
        );
    }
}
