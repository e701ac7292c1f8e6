//! Connection target resolution.
//!
//! Given a configuration, the connection target is tried in this order:
//! an explicit socket address, an explicit `host`/`port` pair, the
//! `_xmpp-client._tcp` SRV records of the service domain in
//! priority/weight order, and finally the service domain itself on the
//! default port.

use core::time::Duration;
use std::net::{IpAddr, SocketAddr};

use futures::{future::select_ok, FutureExt};
use hickory_resolver::{
    config::LookupIpStrategy, name_server::TokioConnectionProvider, IntoName, TokioAsyncResolver,
};
use log::debug;
use tokio::net::TcpStream;

use crate::config::ClientConfig;
use crate::error::Error;

/// A resolved or resolvable connection target.
#[derive(Clone, Debug)]
pub enum DnsConfig {
    /// Use SRV records to find the server host.
    UseSrv {
        /// Service domain to resolve.
        host: String,
        /// SRV service label, e.g. `_xmpp-client._tcp`.
        srv: String,
        /// Port to use when SRV resolution fails.
        fallback_port: u16,
    },

    /// Manually defined server host and port.
    NoSrv {
        /// Server host name.
        host: String,
        /// Server port.
        port: u16,
    },

    /// Manually defined socket address.
    Addr {
        /// IP and port.
        addr: SocketAddr,
    },
}

impl std::fmt::Display for DnsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UseSrv { host, .. } => write!(f, "{}", host),
            Self::NoSrv { host, port } => write!(f, "{}:{}", host, port),
            Self::Addr { addr } => write!(f, "{}", addr),
        }
    }
}

impl DnsConfig {
    /// The target the given configuration asks for.
    pub fn from_config(config: &ClientConfig) -> DnsConfig {
        if let Some(addr) = config.host_address {
            return DnsConfig::Addr { addr };
        }
        if let Some(ref host) = config.host {
            return DnsConfig::NoSrv {
                host: host.clone(),
                port: config.port(),
            };
        }
        // Direct TLS has no SRV service of its own here; SRV lookup is
        // only meaningful for the STARTTLS profile on 5222.
        if config.direct_tls || config.port.is_some() {
            return DnsConfig::NoSrv {
                host: config.service_domain.clone(),
                port: config.port(),
            };
        }
        DnsConfig::UseSrv {
            host: config.service_domain.clone(),
            srv: "_xmpp-client._tcp".to_owned(),
            fallback_port: config.port(),
        }
    }

    /// Try to resolve this target to a connected `TcpStream`.
    pub async fn resolve(&self) -> Result<TcpStream, Error> {
        match self {
            Self::Addr { addr } => Ok(TcpStream::connect(addr).await?),
            Self::NoSrv { host, port } => connect_host(host, *port).await,
            Self::UseSrv {
                host,
                srv,
                fallback_port,
            } => {
                let mut last_error = Error::Disconnected;
                for (target, port) in srv_candidates(host, srv, *fallback_port).await? {
                    match connect_host(&target, port).await {
                        Ok(stream) => return Ok(stream),
                        Err(e) => {
                            debug!("candidate {}:{} failed: {}", target, port, e);
                            last_error = e;
                        }
                    }
                }
                Err(last_error)
            }
        }
    }
}

/// The connection candidates for a service domain: its SRV records in
/// RFC 2782 order, or the domain itself when none are published.
async fn srv_candidates(
    domain: &str,
    service: &str,
    fallback_port: u16,
) -> Result<Vec<(String, u16)>, Error> {
    let domain = idna::domain_to_ascii(domain)?;
    if domain.parse::<IpAddr>().is_ok() {
        // An IP literal has no SRV records to consult.
        return Ok(vec![(domain, fallback_port)]);
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
    let srv_name = format!("{}.{}.", service, domain).into_name()?;
    let lookup = match resolver.srv_lookup(srv_name).await {
        Ok(lookup) => lookup,
        Err(e) => {
            debug!("SRV lookup for {} failed ({}), falling back to the domain", domain, e);
            return Ok(vec![(domain, fallback_port)]);
        }
    };

    let mut records: Vec<(u16, u16, String, u16)> = lookup
        .iter()
        .map(|record| {
            (
                record.priority(),
                record.weight(),
                record.target().to_ascii(),
                record.port(),
            )
        })
        .collect();
    if records.is_empty() {
        return Ok(vec![(domain, fallback_port)]);
    }
    // Lowest priority first; within a priority, heavier weights first.
    records.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    Ok(records
        .into_iter()
        .map(|(_, _, target, port)| (target, port))
        .collect())
}

/// Connects to one host, racing the attempt across all of its addresses
/// and keeping the first to succeed.
async fn connect_host(host: &str, port: u16) -> Result<TcpStream, Error> {
    let host = idna::domain_to_ascii(host)?;
    if let Ok(ip) = host.parse() {
        return Ok(TcpStream::connect(SocketAddr::new(ip, port)).await?);
    }

    let (resolver_config, mut options) = hickory_resolver::system_conf::read_system_conf()?;
    options.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    let resolver =
        TokioAsyncResolver::new(resolver_config, options, TokioConnectionProvider::default());
    let addrs: Vec<SocketAddr> = resolver
        .lookup_ip(host.as_str())
        .await?
        .into_iter()
        .map(|ip| SocketAddr::new(ip, port))
        .collect();
    if addrs.is_empty() {
        return Err(Error::Disconnected);
    }

    debug!("racing {} address(es) for {}:{}", addrs.len(), host, port);
    let attempts = addrs
        .into_iter()
        .map(|addr| TcpStream::connect(addr).boxed());
    let (stream, _) = select_ok(attempts).await?;
    Ok(stream)
}

/// The delay an external reconnect scheduler should wait before attempt
/// number `attempt` (zero-based): exponential from the configured base,
/// capped at the configured maximum.
pub fn backoff_delay(attempt: u32, config: &ClientConfig) -> Duration {
    let exp = attempt.min(16);
    let delay = config
        .reconnect_base_delay
        .saturating_mul(2u32.saturating_pow(exp));
    delay.min(config.reconnect_max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .service_domain("im.example.com")
            .username("juliet")
            .password("pencil")
            .build()
            .unwrap()
    }

    #[test]
    fn target_ladder() {
        let mut config = config();
        assert!(matches!(
            DnsConfig::from_config(&config),
            DnsConfig::UseSrv { ref srv, fallback_port: 5222, .. } if srv == "_xmpp-client._tcp"
        ));

        config.host = Some("talk.example.com".to_owned());
        assert!(matches!(
            DnsConfig::from_config(&config),
            DnsConfig::NoSrv { ref host, port: 5222 } if host == "talk.example.com"
        ));

        config.host_address = Some("192.0.2.1:52220".parse().unwrap());
        assert!(matches!(
            DnsConfig::from_config(&config),
            DnsConfig::Addr { .. }
        ));
    }

    #[test]
    fn direct_tls_skips_srv() {
        let mut config = config();
        config.direct_tls = true;
        assert!(matches!(
            DnsConfig::from_config(&config),
            DnsConfig::NoSrv { port: 5223, .. }
        ));
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let config = config();
        assert_eq!(backoff_delay(0, &config), Duration::from_secs(2));
        assert_eq!(backoff_delay(1, &config), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, &config), Duration::from_secs(16));
        assert_eq!(backoff_delay(10, &config), Duration::from_secs(60));
        assert_eq!(backoff_delay(u32::MAX, &config), Duration::from_secs(60));
    }
}
