//! The extension-element provider registry.
//!
//! Maps `(local name, namespace)` of a stanza child element to a parser
//! producing a typed [`Payload`]. The registry is process-wide: built-in
//! entries are installed lazily on first use and applications may add their
//! own before creating connections. Lookups clone an `Arc` snapshot, so
//! readers never block writers and no lock is held while parsing.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::ParseError;
use crate::ns;
use crate::stanza::{bind, ping, Payload};
use crate::xml::Element;

/// A parser for one `(element, namespace)` pair.
pub type Provider = fn(&Element) -> Result<Payload, ParseError>;

type RegistryMap = HashMap<(String, String), Provider>;

fn registry() -> &'static RwLock<Arc<RegistryMap>> {
    static REGISTRY: OnceLock<RwLock<Arc<RegistryMap>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = RegistryMap::new();
        map.insert(
            ("ping".to_owned(), ns::PING.to_owned()),
            ping::provider as Provider,
        );
        map.insert(
            ("bind".to_owned(), ns::BIND.to_owned()),
            bind::provider as Provider,
        );
        RwLock::new(Arc::new(map))
    })
}

/// Registers a provider for the given element name and namespace,
/// replacing any previous entry for that pair.
///
/// Registration is copy-on-write; it is intended to happen at program
/// startup, before connections are created.
pub fn register(name: &str, namespace: &str, provider: Provider) {
    let lock = registry();
    let mut guard = lock.write().unwrap();
    let mut map = (**guard).clone();
    map.insert((name.to_owned(), namespace.to_owned()), provider);
    *guard = Arc::new(map);
}

/// Looks up the provider for the given element name and namespace.
pub(crate) fn lookup(name: &str, namespace: &str) -> Option<Provider> {
    let snapshot = registry().read().unwrap().clone();
    snapshot
        .get(&(name.to_owned(), namespace.to_owned()))
        .copied()
}
