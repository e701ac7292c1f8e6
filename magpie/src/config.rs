//! Connection configuration.

use core::fmt;
use core::time::Duration;
use std::error::Error as StdError;
use std::net::SocketAddr;

use crate::jid::Jid;

/// Default frame size cap: 10 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// The SASL mechanisms enabled when the configuration does not say
/// otherwise, strongest first.
pub const DEFAULT_MECHANISMS: [&str; 4] =
    ["SCRAM-SHA-512", "SCRAM-SHA-256", "SCRAM-SHA-1", "PLAIN"];

/// How strictly the connection insists on transport encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// Refuse to continue on a cleartext stream. The default.
    #[default]
    Required,
    /// Use STARTTLS when offered, continue in the clear otherwise.
    IfPossible,
    /// Never negotiate STARTTLS.
    Disabled,
}

/// Validated connection configuration. Build one with
/// [`ClientConfig::builder`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The XMPP service domain (the part after `@` in the user's JID).
    pub service_domain: String,
    /// Overrides DNS-based host resolution.
    pub host: Option<String>,
    /// Overrides the default port.
    pub port: Option<u16>,
    /// Overrides host resolution entirely with a socket address.
    pub host_address: Option<SocketAddr>,
    /// The resource to request at bind time; the server picks otherwise.
    pub resource: Option<String>,
    /// The account's local name.
    pub username: String,
    /// The account's password.
    pub password: String,
    /// Transport encryption policy.
    pub security_mode: SecurityMode,
    /// Establish TLS immediately on connect (port 5223 model) instead of
    /// negotiating STARTTLS in-band.
    pub direct_tls: bool,
    /// `xml:lang` announced in the stream prologue.
    pub xml_lang: Option<String>,
    /// Enabled SASL mechanism names.
    pub enabled_mechanisms: Vec<String>,
    /// Deadline for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Deadline for IQ responses, including keepalive pings.
    pub read_timeout: Duration,
    /// Send empty available presence when the session starts.
    pub send_presence: bool,
    /// Keepalive ping interval; `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// First delay of the external reconnect schedule.
    pub reconnect_base_delay: Duration,
    /// Upper bound of the external reconnect schedule.
    pub reconnect_max_delay: Duration,
    /// Cap on the wire size of a single top-level stream element.
    pub max_frame_bytes: usize,
}

impl ClientConfig {
    /// Starts building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// The effective port: explicit, or 5223 for direct TLS, or 5222.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.direct_tls { 5223 } else { 5222 })
    }

    /// The bare JID of the configured account.
    pub fn bare_jid(&self) -> Jid {
        Jid::bare(self.username.clone(), self.service_domain.clone())
    }
}

/// Error returned by [`ClientConfigBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No service domain was given.
    MissingServiceDomain,
    /// No username was given.
    MissingUsername,
    /// No password was given.
    MissingPassword,
    /// The enabled mechanism set is empty.
    NoMechanisms,
    /// The frame size cap is zero.
    ZeroMaxFrameBytes,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::MissingServiceDomain => write!(fmt, "service domain is required"),
            ConfigError::MissingUsername => write!(fmt, "username is required"),
            ConfigError::MissingPassword => write!(fmt, "password is required"),
            ConfigError::NoMechanisms => write!(fmt, "at least one SASL mechanism must be enabled"),
            ConfigError::ZeroMaxFrameBytes => write!(fmt, "max_frame_bytes must be non-zero"),
        }
    }
}

impl StdError for ConfigError {}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    service_domain: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    host_address: Option<SocketAddr>,
    resource: Option<String>,
    username: Option<String>,
    password: Option<String>,
    security_mode: SecurityMode,
    direct_tls: bool,
    xml_lang: Option<String>,
    enabled_mechanisms: Vec<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
    send_presence: bool,
    ping_interval: Option<Duration>,
    reconnect_base_delay: Duration,
    reconnect_max_delay: Duration,
    max_frame_bytes: usize,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder {
            service_domain: None,
            host: None,
            port: None,
            host_address: None,
            resource: None,
            username: None,
            password: None,
            security_mode: SecurityMode::default(),
            direct_tls: false,
            xml_lang: None,
            enabled_mechanisms: DEFAULT_MECHANISMS.iter().map(|s| s.to_string()).collect(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            send_presence: true,
            ping_interval: Some(Duration::from_secs(60)),
            reconnect_base_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(60),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ClientConfigBuilder {
    /// The XMPP service domain. Required.
    pub fn service_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.service_domain = Some(domain.into());
        self
    }

    /// Connect to this host instead of resolving SRV records.
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Connect to this port instead of the default.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Connect to this exact address, skipping DNS entirely.
    pub fn host_address(mut self, addr: SocketAddr) -> Self {
        self.host_address = Some(addr);
        self
    }

    /// Request this resource at bind time.
    pub fn resource<S: Into<String>>(mut self, resource: S) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// The account's local name. Required.
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// The account's password. Required.
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Transport encryption policy.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    /// Establish TLS immediately on connect.
    pub fn direct_tls(mut self, direct_tls: bool) -> Self {
        self.direct_tls = direct_tls;
        self
    }

    /// `xml:lang` announced in the stream prologue.
    pub fn xml_lang<S: Into<String>>(mut self, lang: S) -> Self {
        self.xml_lang = Some(lang.into());
        self
    }

    /// Replaces the enabled SASL mechanism set.
    pub fn enabled_mechanisms<I, S>(mut self, mechanisms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_mechanisms = mechanisms.into_iter().map(Into::into).collect();
        self
    }

    /// Deadline for establishing the TCP connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for IQ responses.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Whether to send empty available presence when the session starts.
    pub fn send_presence(mut self, send: bool) -> Self {
        self.send_presence = send;
        self
    }

    /// Keepalive ping interval; `None` disables pings.
    pub fn ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.ping_interval = interval;
        self
    }

    /// First delay of the external reconnect schedule.
    pub fn reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Upper bound of the external reconnect schedule.
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect_max_delay = delay;
        self
    }

    /// Cap on the wire size of a single top-level stream element.
    pub fn max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let service_domain = self
            .service_domain
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::MissingServiceDomain)?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUsername)?;
        let password = self.password.ok_or(ConfigError::MissingPassword)?;
        if self.enabled_mechanisms.is_empty() {
            return Err(ConfigError::NoMechanisms);
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroMaxFrameBytes);
        }
        Ok(ClientConfig {
            service_domain,
            host: self.host,
            port: self.port,
            host_address: self.host_address,
            resource: self.resource,
            username,
            password,
            security_mode: self.security_mode,
            direct_tls: self.direct_tls,
            xml_lang: self.xml_lang,
            enabled_mechanisms: self.enabled_mechanisms,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            send_presence: self.send_presence,
            ping_interval: self.ping_interval,
            reconnect_base_delay: self.reconnect_base_delay,
            reconnect_max_delay: self.reconnect_max_delay,
            max_frame_bytes: self.max_frame_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ClientConfigBuilder {
        ClientConfig::builder()
            .service_domain("im.example.com")
            .username("juliet")
            .password("pencil")
    }

    #[test]
    fn defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.port(), 5222);
        assert_eq!(config.security_mode, SecurityMode::Required);
        assert_eq!(config.max_frame_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.reconnect_base_delay, Duration::from_secs(2));
        assert_eq!(config.reconnect_max_delay, Duration::from_secs(60));
        assert_eq!(config.enabled_mechanisms.len(), 4);
        assert!(config.send_presence);
    }

    #[test]
    fn direct_tls_changes_default_port() {
        let config = minimal().direct_tls(true).build().unwrap();
        assert_eq!(config.port(), 5223);
        let config = minimal().direct_tls(true).port(443).build().unwrap();
        assert_eq!(config.port(), 443);
    }

    #[test]
    fn required_fields_are_validated() {
        let err = ClientConfig::builder()
            .username("juliet")
            .password("pencil")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingServiceDomain);
        let err = ClientConfig::builder()
            .service_domain("im.example.com")
            .password("pencil")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingUsername);
    }

    #[test]
    fn bare_jid() {
        let config = minimal().build().unwrap();
        assert_eq!(config.bare_jid().to_string(), "juliet@im.example.com");
    }
}
