//! Detailed error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::net::AddrParseError;
use std::sync::Arc;

use hickory_resolver::error::ResolveError as DnsResolveError;
use hickory_resolver::proto::error::ProtoError as DnsProtoError;
use magpie_sasl::client::MechanismError as SaslMechanismError;

use crate::jid;
use crate::stanza::error::StanzaError;
use crate::stanza::sasl::SaslFailure;
use crate::stanza::stream::StreamError;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(IoError),
    /// Error parsing Jabber-Id
    JidParse(jid::Error),
    /// Protocol-level error
    Protocol(ProtocolError),
    /// Authentication error
    Auth(AuthError),
    /// Error decoding the inbound byte stream
    Parse(ParseError),
    /// An `<error/>` carried in an IQ response; fatal to the request, not
    /// to the connection
    Stanza(StanzaError),
    /// A per-request deadline elapsed
    Timeout,
    /// Connection closed cleanly
    Disconnected,
    /// Request abandoned because the session was torn down cleanly
    Cancelled,
    /// Connection torn down by the given fatal error; reported to every
    /// request that was still pending at that point
    ClosedOnError(Arc<Error>),
    /// TLS handshake or certificate error
    Tls(tokio_rustls::rustls::Error),
    /// The configured server name is not a valid TLS server name
    DnsName(tokio_rustls::rustls::pki_types::InvalidDnsNameError),
    /// DNS protocol error
    Dns(DnsProtoError),
    /// DNS resolution error
    Resolve(DnsResolveError),
    /// DNS label conversion error, no details available from module `idna`
    Idna,
    /// Invalid IP/Port address
    Addr(AddrParseError),
    /// Fmt error
    Fmt(fmt::Error),
    /// Should never happen
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::JidParse(e) => write!(fmt, "jid parse error: {}", e),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Auth(e) => write!(fmt, "authentication error: {}", e),
            Error::Parse(e) => write!(fmt, "parse error: {}", e),
            Error::Stanza(e) => write!(fmt, "stanza error: {}", e),
            Error::Timeout => write!(fmt, "request timed out"),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::Cancelled => write!(fmt, "cancelled by connection shutdown"),
            Error::ClosedOnError(e) => write!(fmt, "connection closed on error: {}", e),
            Error::Tls(e) => write!(fmt, "TLS error: {}", e),
            Error::DnsName(e) => write!(fmt, "TLS server name error: {}", e),
            Error::Dns(e) => write!(fmt, "{:?}", e),
            Error::Resolve(e) => write!(fmt, "{:?}", e),
            Error::Idna => write!(fmt, "IDNA error"),
            Error::Addr(e) => write!(fmt, "wrong network address: {}", e),
            Error::Fmt(e) => write!(fmt, "fmt error: {}", e),
            Error::InvalidState => write!(fmt, "invalid state"),
        }
    }
}

impl StdError for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::JidParse(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<StanzaError> for Error {
    fn from(e: StanzaError) -> Self {
        Error::Stanza(e)
    }
}

impl From<tokio_rustls::rustls::Error> for Error {
    fn from(e: tokio_rustls::rustls::Error) -> Self {
        Error::Tls(e)
    }
}

impl From<tokio_rustls::rustls::pki_types::InvalidDnsNameError> for Error {
    fn from(e: tokio_rustls::rustls::pki_types::InvalidDnsNameError) -> Self {
        Error::DnsName(e)
    }
}

impl From<DnsProtoError> for Error {
    fn from(e: DnsProtoError) -> Self {
        Error::Dns(e)
    }
}

impl From<DnsResolveError> for Error {
    fn from(e: DnsResolveError) -> Self {
        Error::Resolve(e)
    }
}

impl From<idna::Errors> for Error {
    fn from(_e: idna::Errors) -> Self {
        Error::Idna
    }
}

impl From<AddrParseError> for Error {
    fn from(e: AddrParseError) -> Self {
        Error::Addr(e)
    }
}

impl From<fmt::Error> for Error {
    fn from(e: fmt::Error) -> Self {
        Error::Fmt(e)
    }
}

/// XMPP protocol-level error
#[derive(Debug)]
pub enum ProtocolError {
    /// The server does not offer STARTTLS but the configuration requires
    /// an encrypted stream
    TlsRequiredButUnavailable,
    /// The server answered `<starttls/>` with `<failure/>`
    TlsRefused,
    /// The stream features offer nothing this client can proceed with
    InvalidFeatures,
    /// Encountered an element that is not acceptable in the current state
    UnexpectedElement(String),
    /// The `<stream:stream>` header sent by the server is unusable
    InvalidStreamHeader,
    /// Invalid response to resource binding
    InvalidBindResponse,
    /// The server rejected resource binding
    BindFailed(StanzaError),
    /// `<stream:error/>` received from the server
    Stream(StreamError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::TlsRequiredButUnavailable => {
                write!(fmt, "encryption is required but the server does not offer STARTTLS")
            }
            ProtocolError::TlsRefused => write!(fmt, "server refused STARTTLS"),
            ProtocolError::InvalidFeatures => {
                write!(fmt, "stream features offer no usable negotiation step")
            }
            ProtocolError::UnexpectedElement(name) => {
                write!(fmt, "unexpected element <{}/> in current state", name)
            }
            ProtocolError::InvalidStreamHeader => write!(fmt, "invalid <stream:stream> header"),
            ProtocolError::InvalidBindResponse => {
                write!(fmt, "invalid response to resource binding")
            }
            ProtocolError::BindFailed(e) => write!(fmt, "resource binding failed: {}", e),
            ProtocolError::Stream(e) => write!(fmt, "stream error from server: {}", e),
        }
    }
}

impl StdError for ProtocolError {}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// No matching SASL mechanism available
    NoMechanism,
    /// PLAIN was the only candidate mechanism but the stream is not
    /// encrypted; the credentials were not sent
    InsecurePlainRefused,
    /// Local SASL mechanism error, including server signature mismatch
    Sasl(SaslMechanismError),
    /// `<failure/>` from the server
    Fail(SaslFailure),
}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::NoMechanism => write!(fmt, "no matching SASL mechanism available"),
            AuthError::InsecurePlainRefused => {
                write!(fmt, "refusing to use PLAIN on an unencrypted stream")
            }
            AuthError::Sasl(e) => write!(fmt, "SASL mechanism error: {}", e),
            AuthError::Fail(f) => write!(fmt, "failure from the server: {}", f),
        }
    }
}

impl StdError for AuthError {}

impl From<SaslMechanismError> for AuthError {
    fn from(e: SaslMechanismError) -> Self {
        AuthError::Sasl(e)
    }
}

/// Error decoding the inbound byte stream
#[derive(Debug)]
pub enum ParseError {
    /// The XML is not well-formed
    Xml(rxml::Error),
    /// A single stream-level element exceeded the configured frame size cap
    FramingOverflow,
    /// Base64 payload could not be decoded
    Base64(base64::DecodeError),
    /// An element violates stanza schema in a way that cannot be preserved
    /// as a generic element
    InvalidStanza(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Xml(e) => write!(fmt, "XML parser error: {}", e),
            ParseError::FramingOverflow => {
                write!(fmt, "stream element exceeds the configured frame size cap")
            }
            ParseError::Base64(e) => write!(fmt, "base64 decode error: {}", e),
            ParseError::InvalidStanza(what) => write!(fmt, "invalid stanza: {}", what),
        }
    }
}

impl StdError for ParseError {}

impl From<rxml::Error> for ParseError {
    fn from(e: rxml::Error) -> Self {
        ParseError::Xml(e)
    }
}

impl From<base64::DecodeError> for ParseError {
    fn from(e: base64::DecodeError) -> Self {
        ParseError::Base64(e)
    }
}
