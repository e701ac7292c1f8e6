//! Jabber identifiers (`local@domain/resource`).

use core::fmt;
use std::error::Error as StdError;
use std::str::FromStr;

/// Error returned when parsing a [`Jid`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The string contains no domain part.
    DomainEmpty,
    /// The string has an `@` but nothing before it.
    LocalEmpty,
    /// The string has a `/` but nothing after it.
    ResourceEmpty,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DomainEmpty => write!(fmt, "domain part is empty"),
            Error::LocalEmpty => write!(fmt, "local part is empty"),
            Error::ResourceEmpty => write!(fmt, "resource part is empty"),
        }
    }
}

impl StdError for Error {}

/// A Jabber identifier.
///
/// A bare JID is `local@domain` (or just `domain`); a full JID additionally
/// carries the resource assigned during resource binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Constructs a bare domain JID.
    pub fn domain<D: Into<String>>(domain: D) -> Jid {
        Jid {
            local: None,
            domain: domain.into(),
            resource: None,
        }
    }

    /// Constructs a bare `local@domain` JID.
    pub fn bare<L: Into<String>, D: Into<String>>(local: L, domain: D) -> Jid {
        Jid {
            local: Some(local.into()),
            domain: domain.into(),
            resource: None,
        }
    }

    /// The local part, if any.
    pub fn node(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// The domain part.
    pub fn domain_str(&self) -> &str {
        &self.domain
    }

    /// The resource part, if any.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Whether this is a full JID (carries a resource).
    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }

    /// This JID with the resource stripped.
    pub fn to_bare(&self) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    /// This JID with the given resource.
    pub fn with_resource<R: Into<String>>(&self, resource: R) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: Some(resource.into()),
        }
    }
}

impl FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Jid, Error> {
        let (rest, resource) = match s.split_once('/') {
            Some((rest, resource)) => {
                if resource.is_empty() {
                    return Err(Error::ResourceEmpty);
                }
                (rest, Some(resource.to_owned()))
            }
            None => (s, None),
        };
        let (local, domain) = match rest.split_once('@') {
            Some((local, domain)) => {
                if local.is_empty() {
                    return Err(Error::LocalEmpty);
                }
                (Some(local.to_owned()), domain)
            }
            None => (None, rest),
        };
        if domain.is_empty() {
            return Err(Error::DomainEmpty);
        }
        Ok(Jid {
            local,
            domain: domain.to_owned(),
            resource,
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref local) = self.local {
            write!(fmt, "{}@", local)?;
        }
        write!(fmt, "{}", self.domain)?;
        if let Some(ref resource) = self.resource {
            write!(fmt, "/{}", resource)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full() {
        let jid: Jid = "juliet@im.example.com/balcony".parse().unwrap();
        assert_eq!(jid.node(), Some("juliet"));
        assert_eq!(jid.domain_str(), "im.example.com");
        assert_eq!(jid.resource(), Some("balcony"));
        assert!(jid.is_full());
    }

    #[test]
    fn parse_bare() {
        let jid: Jid = "juliet@im.example.com".parse().unwrap();
        assert!(!jid.is_full());
        assert_eq!(jid.to_string(), "juliet@im.example.com");
    }

    #[test]
    fn parse_domain_only() {
        let jid: Jid = "im.example.com".parse().unwrap();
        assert_eq!(jid.node(), None);
        assert_eq!(jid.domain_str(), "im.example.com");
    }

    #[test]
    fn resource_may_contain_at_and_slash() {
        let jid: Jid = "juliet@im.example.com/foo@bar/baz".parse().unwrap();
        assert_eq!(jid.resource(), Some("foo@bar/baz"));
    }

    #[test]
    fn rejects_empty_parts() {
        assert_eq!("".parse::<Jid>(), Err(Error::DomainEmpty));
        assert_eq!("@example.com".parse::<Jid>(), Err(Error::LocalEmpty));
        assert_eq!("juliet@example.com/".parse::<Jid>(), Err(Error::ResourceEmpty));
    }

    #[test]
    fn round_trip() {
        let jid: Jid = "juliet@im.example.com/balcony".parse().unwrap();
        assert_eq!(jid.to_bare().to_string(), "juliet@im.example.com");
        assert_eq!(
            jid.to_bare().with_resource("chamber").to_string(),
            "juliet@im.example.com/chamber"
        );
    }
}
