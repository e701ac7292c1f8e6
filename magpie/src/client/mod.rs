//! XMPP client connection and state.

use std::io;
use std::sync::Arc;

use core::time::Duration;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::connect::DnsConfig;
use crate::error::Error;
use crate::jid::Jid;
use crate::proto::Packet;
use crate::stanza::{make_id, Iq, Presence, Stanza};

mod auth;
mod bind;
mod dispatch;
mod iq_tracker;
mod negotiation;
mod state;
mod transport;
mod worker;

pub use dispatch::{ConnectionEvent, HandlerMode, IqRequestHandler, IqRequestType};
pub use iq_tracker::{IqResponse, IqResponseToken};
pub use state::ConnectionState;

use dispatch::Router;
use iq_tracker::IqTracker;
use state::StateHandle;
use worker::{Command, Worker};

/// A connected XMPP client session.
///
/// Created with [`Client::connect`]; cheap to clone, and every clone
/// refers to the same connection. The connection itself is driven by a
/// background worker task whose lifetime is bounded by the session: it
/// ends when [`close`][`Client::close`] is called or a fatal error
/// occurs.
#[derive(Clone)]
pub struct Client {
    state: StateHandle,
    router: Arc<Router>,
    tracker: IqTracker,
    command_tx: mpsc::Sender<Command>,
    bound_jid: Jid,
    stream_id: Option<String>,
    read_timeout: Duration,
}

impl Client {
    /// Resolves the connection target from `config`, connects, and
    /// negotiates a session to completion (TLS as configured, SASL,
    /// resource binding).
    pub async fn connect(config: ClientConfig) -> Result<Client, Error> {
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        let target = DnsConfig::from_config(&config);
        log::debug!("connecting to {}", target);
        let tcp_stream = match tokio::time::timeout(config.connect_timeout, target.resolve()).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                state.close();
                return Err(e);
            }
            Err(_) => {
                state.close();
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timeout elapsed",
                )));
            }
        };
        Self::session(tcp_stream, config, state).await
    }

    /// Negotiates a session over an already-established transport.
    ///
    /// This is [`connect`][`Client::connect`] without the address
    /// resolution step; useful for custom transports and tests.
    pub async fn connect_over<S>(io: S, config: ClientConfig) -> Result<Client, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        Self::session(io, config, state).await
    }

    async fn session<S>(io: S, config: ClientConfig, state: StateHandle) -> Result<Client, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut session = match negotiation::establish(io, &config, &state).await {
            Ok(session) => session,
            Err(e) => {
                state.close();
                return Err(e);
            }
        };

        if config.send_presence {
            let presence = Presence::available().to_element();
            if let Err(e) = session.framed.send(Packet::Element(presence)).await {
                state.close();
                return Err(e);
            }
        }

        let router = Arc::new(Router::new());
        let tracker = IqTracker::new();
        let (command_tx, command_rx) = mpsc::channel(16);

        // The worker emits ConnectionEvent::SessionActive from its first
        // poll, so listeners registered on the returned Client before
        // yielding to the runtime observe the session coming up.
        let worker = Worker::new(
            session.framed,
            router.clone(),
            tracker.clone(),
            state.clone(),
            command_rx,
            command_tx.clone(),
            session.bound_jid.clone(),
            Jid::domain(config.service_domain.clone()),
            config.ping_interval,
            config.read_timeout,
        );
        tokio::spawn(worker.run());

        Ok(Client {
            state,
            router,
            tracker,
            command_tx,
            bound_jid: session.bound_jid,
            stream_id: session.stream_id.take(),
            read_timeout: config.read_timeout,
        })
    }

    /// The full JID the server assigned at bind time.
    pub fn bound_jid(&self) -> &Jid {
        &self.bound_jid
    }

    /// The `id` attribute of the final server stream header, if any.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// Whether the session is active.
    pub fn is_connected(&self) -> bool {
        self.state.state() == ConnectionState::SessionActive
    }

    /// Whether SASL authentication has completed.
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Sends a stanza, assigning an ID if it has none.
    pub async fn send_stanza(&self, mut stanza: Stanza) -> Result<(), Error> {
        stanza.ensure_id();
        self.command_tx
            .send(Command::Send(stanza))
            .await
            .map_err(|_| Error::Disconnected)
    }

    /// Sends a `get`/`set` IQ and returns a future completing with its
    /// response.
    ///
    /// The returned [`IqResponseToken`] completes with the matching
    /// `result` or `error`, with [`Error::Timeout`] once the configured
    /// read timeout passes, or with a teardown error if the session dies
    /// first.
    pub async fn send_iq(&self, mut iq: Iq) -> Result<IqResponseToken, Error> {
        if !iq.typ.is_request() {
            return Err(Error::InvalidState);
        }
        let id = iq.id.get_or_insert_with(make_id).clone();
        let token = self.tracker.register(id, self.read_timeout);
        self.command_tx
            .send(Command::Send(Stanza::Iq(iq)))
            .await
            .map_err(|_| Error::Disconnected)?;
        Ok(token)
    }

    /// Registers a handler answering inbound IQ requests for one
    /// `(element, namespace, get|set)` triple, replacing any previous
    /// one.
    pub fn register_iq_request_handler(&self, handler: Arc<dyn IqRequestHandler>) {
        self.router.register_handler(handler);
    }

    /// Adds a listener invoked for every inbound stanza matching
    /// `filter`, except those consumed by an IQ request handler or the
    /// response correlation. Callbacks run on the blocking pool.
    pub fn add_stanza_listener<F, C>(&self, filter: F, callback: C)
    where
        F: Fn(&Stanza) -> bool + Send + Sync + 'static,
        C: Fn(Stanza) + Send + Sync + 'static,
    {
        self.router.add_listener(filter, callback);
    }

    /// Adds a listener for connection lifecycle events.
    ///
    /// The most recent event is replayed to the listener at registration,
    /// so a listener added after [`connect`][`Client::connect`] returns
    /// still observes [`ConnectionEvent::SessionActive`].
    pub fn add_connection_listener<C>(&self, callback: C)
    where
        C: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.router.add_connection_listener(callback);
    }

    /// Closes the connection cleanly: the stream footer is sent, the
    /// socket is shut down, pending IQ futures complete with
    /// [`Error::Cancelled`] and listeners are notified once. Calling
    /// this on an already-closed client is a no-op.
    pub async fn close(&self) {
        if self.state.state() == ConnectionState::Closed {
            return;
        }
        let _ = self.command_tx.send(Command::Close).await;
    }
}
