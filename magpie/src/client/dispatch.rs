//! Inbound stanza routing: IQ request handlers and filter-based
//! listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::Error;
use crate::jid::Jid;
use crate::ns;
use crate::stanza::error::StanzaError;
use crate::stanza::{Iq, IqType, Payload, Stanza};

/// Which request kind a handler answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqRequestType {
    /// `type="get"` requests.
    Get,
    /// `type="set"` requests.
    Set,
}

impl IqRequestType {
    fn from_iq_type(typ: IqType) -> Option<IqRequestType> {
        match typ {
            IqType::Get => Some(IqRequestType::Get),
            IqType::Set => Some(IqRequestType::Set),
            _ => None,
        }
    }
}

/// Where a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerMode {
    /// Inline on the inbound event loop. Only for handlers that never
    /// block.
    Sync,
    /// On the blocking worker pool, with the reply sent asynchronously.
    Async,
}

/// Answers inbound IQ requests carrying a specific child element.
///
/// The handler's return value is serialized as a `result` IQ with the
/// request's id, addressed back to the requester; an `Err` becomes an
/// `error` IQ instead.
pub trait IqRequestHandler: Send + Sync {
    /// Local name of the child element this handler answers.
    fn element_name(&self) -> &str;

    /// Namespace of the child element this handler answers.
    fn element_namespace(&self) -> &str;

    /// Which request kind this handler answers.
    fn request_type(&self) -> IqRequestType {
        IqRequestType::Get
    }

    /// Where the handler runs.
    fn mode(&self) -> HandlerMode {
        HandlerMode::Sync
    }

    /// Produces the payload of the `result` IQ.
    fn handle(&self, iq: &Iq) -> Result<Option<Payload>, StanzaError>;
}

/// The built-in XEP-0199 responder: answers `<ping/>` gets with an empty
/// result.
pub(crate) struct PingHandler;

impl IqRequestHandler for PingHandler {
    fn element_name(&self) -> &str {
        "ping"
    }

    fn element_namespace(&self) -> &str {
        ns::PING
    }

    fn handle(&self, _iq: &Iq) -> Result<Option<Payload>, StanzaError> {
        Ok(None)
    }
}

/// Lifecycle notifications delivered to connection listeners.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Negotiation finished; the session is usable.
    SessionActive {
        /// The full JID assigned at bind time.
        bound_jid: Jid,
    },
    /// The connection was closed cleanly.
    Closed,
    /// The connection died from the given error.
    ClosedOnError(Arc<Error>),
}

type HandlerKey = (String, String, IqRequestType);

#[derive(Clone)]
struct StanzaListener {
    filter: Arc<dyn Fn(&Stanza) -> bool + Send + Sync>,
    callback: Arc<dyn Fn(Stanza) + Send + Sync>,
}

/// Routing state shared between the [`Client`][`crate::Client`] handle
/// and the connection worker.
///
/// Registrations take a short write lock; dispatch clones a snapshot and
/// never holds a lock while a callback runs.
pub(crate) struct Router {
    handlers: RwLock<HashMap<HandlerKey, Arc<dyn IqRequestHandler>>>,
    listeners: RwLock<Vec<StanzaListener>>,
    connection_listeners: RwLock<Vec<Arc<dyn Fn(&ConnectionEvent) + Send + Sync>>>,
    /// The last lifecycle event, replayed to listeners registered after
    /// it fired. Registration and notification serialize on this lock so
    /// every listener observes each event exactly once.
    last_connection_event: Mutex<Option<ConnectionEvent>>,
}

impl Router {
    pub(crate) fn new() -> Router {
        let router = Router {
            handlers: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            connection_listeners: RwLock::new(Vec::new()),
            last_connection_event: Mutex::new(None),
        };
        router.register_handler(Arc::new(PingHandler));
        router
    }

    pub(crate) fn register_handler(&self, handler: Arc<dyn IqRequestHandler>) {
        let key = (
            handler.element_name().to_owned(),
            handler.element_namespace().to_owned(),
            handler.request_type(),
        );
        self.handlers.write().unwrap().insert(key, handler);
    }

    /// The handler responsible for an inbound request IQ, if any.
    pub(crate) fn handler_for(&self, iq: &Iq) -> Option<Arc<dyn IqRequestHandler>> {
        let request_type = IqRequestType::from_iq_type(iq.typ)?;
        let payload = iq.payload()?;
        let key = (
            payload.name().to_owned(),
            payload.namespace().to_owned(),
            request_type,
        );
        self.handlers.read().unwrap().get(&key).cloned()
    }

    pub(crate) fn add_listener<F, C>(&self, filter: F, callback: C)
    where
        F: Fn(&Stanza) -> bool + Send + Sync + 'static,
        C: Fn(Stanza) + Send + Sync + 'static,
    {
        self.listeners.write().unwrap().push(StanzaListener {
            filter: Arc::new(filter),
            callback: Arc::new(callback),
        });
    }

    pub(crate) fn add_connection_listener<C>(&self, callback: C)
    where
        C: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&ConnectionEvent) + Send + Sync> = Arc::new(callback);
        let replay = {
            let guard = self.last_connection_event.lock().unwrap();
            self.connection_listeners
                .write()
                .unwrap()
                .push(callback.clone());
            guard.clone()
        };
        if let Some(event) = replay {
            tokio::task::spawn_blocking(move || callback(&event));
        }
    }

    /// Fans a stanza out to the matching listeners, in registration
    /// order. Callbacks run on the blocking pool so that a slow listener
    /// cannot stall the inbound loop.
    pub(crate) fn dispatch_stanza(&self, stanza: &Stanza) {
        let listeners: Vec<StanzaListener> = self.listeners.read().unwrap().clone();
        for listener in listeners {
            if (listener.filter)(stanza) {
                let callback = listener.callback.clone();
                let stanza = stanza.clone();
                tokio::task::spawn_blocking(move || callback(stanza));
            }
        }
    }

    /// Notifies every connection listener of a lifecycle event.
    pub(crate) fn notify_connection(&self, event: &ConnectionEvent) {
        let listeners = {
            let mut guard = self.last_connection_event.lock().unwrap();
            *guard = Some(event.clone());
            self.connection_listeners.read().unwrap().clone()
        };
        for listener in listeners {
            let event = event.clone();
            tokio::task::spawn_blocking(move || listener(&event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::Ping;
    use core::time::Duration;
    use std::sync::mpsc;

    fn ping_request(typ: IqType) -> Iq {
        Iq {
            id: Some("p1".to_owned()),
            from: Some("im.example.com".parse().unwrap()),
            to: None,
            typ,
            payloads: vec![Payload::Ping(Ping)],
            error: None,
        }
    }

    #[test]
    fn builtin_ping_handler_answers_gets_only() {
        let router = Router::new();
        assert!(router.handler_for(&ping_request(IqType::Get)).is_some());
        assert!(router.handler_for(&ping_request(IqType::Set)).is_none());
        assert!(router.handler_for(&ping_request(IqType::Result)).is_none());
    }

    #[test]
    fn ping_handler_returns_empty_result() {
        let handler = PingHandler;
        assert!(matches!(handler.handle(&ping_request(IqType::Get)), Ok(None)));
    }

    #[tokio::test]
    async fn listeners_run_in_registration_order_with_filters() {
        let router = Router::new();
        let (tx, rx) = mpsc::channel();
        let tx_a = tx.clone();
        router.add_listener(
            |stanza| matches!(stanza, Stanza::Message(_)),
            move |_| tx_a.send("messages").unwrap(),
        );
        let tx_b = tx.clone();
        router.add_listener(|_| true, move |_| tx_b.send("all").unwrap());

        router.dispatch_stanza(&Stanza::Message(crate::stanza::Message::default()));
        let mut seen = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        seen.sort();
        assert_eq!(seen, vec!["all", "messages"]);

        router.dispatch_stanza(&Stanza::Presence(crate::stanza::Presence::default()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "all");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[tokio::test]
    async fn connection_listeners_receive_events() {
        let router = Router::new();
        let (tx, rx) = mpsc::channel();
        router.add_connection_listener(move |event| {
            tx.send(matches!(event, ConnectionEvent::Closed)).unwrap();
        });
        router.notify_connection(&ConnectionEvent::Closed);
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[tokio::test]
    async fn late_connection_listener_gets_the_last_event_replayed() {
        let router = Router::new();
        router.notify_connection(&ConnectionEvent::SessionActive {
            bound_jid: "juliet@im.example.com/balcony".parse().unwrap(),
        });

        let (tx, rx) = mpsc::channel();
        router.add_connection_listener(move |event| {
            if let ConnectionEvent::SessionActive { bound_jid } = event {
                tx.send(bound_jid.to_string()).unwrap();
            }
        });
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "juliet@im.example.com/balcony"
        );
        // Replay happens once, at registration.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
