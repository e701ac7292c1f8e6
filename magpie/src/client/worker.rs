//! The connection worker: a single task owning the framed transport.
//!
//! All inbound dispatch and outbound serialization happens here, in wire
//! order. Handlers in [`HandlerMode::Sync`] run inline; everything else
//! (async handlers, listeners) is handed off so this loop never blocks.

use std::sync::Arc;

use core::ops::ControlFlow;
use core::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::client::dispatch::{ConnectionEvent, HandlerMode, IqRequestHandler, Router};
use crate::client::iq_tracker::IqTracker;
use crate::client::state::StateHandle;
use crate::client::transport::Transport;
use crate::error::{Error, ProtocolError};
use crate::jid::Jid;
use crate::proto::{Frame, Packet, XmppCodec};
use crate::stanza::{make_id, Iq, IqType, Payload, Ping, Stanza, StreamItem};

/// Commands from the [`Client`][`crate::Client`] handle to the worker.
pub(crate) enum Command {
    /// Serialize and send a stanza.
    Send(Stanza),
    /// Tear the connection down with the given error (used by watchdogs).
    Fatal(Error),
    /// Orderly shutdown.
    Close,
}

pub(crate) struct Worker<S: AsyncRead + AsyncWrite + Unpin> {
    framed: Framed<Transport<S>, XmppCodec>,
    router: Arc<Router>,
    tracker: IqTracker,
    state: StateHandle,
    commands: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
    bound_jid: Jid,
    server_jid: Jid,
    ping_interval: Option<Duration>,
    read_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Worker<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        framed: Framed<Transport<S>, XmppCodec>,
        router: Arc<Router>,
        tracker: IqTracker,
        state: StateHandle,
        commands: mpsc::Receiver<Command>,
        command_tx: mpsc::Sender<Command>,
        bound_jid: Jid,
        server_jid: Jid,
        ping_interval: Option<Duration>,
        read_timeout: Duration,
    ) -> Worker<S> {
        Worker {
            framed,
            router,
            tracker,
            state,
            commands,
            command_tx,
            bound_jid,
            server_jid,
            ping_interval,
            read_timeout,
        }
    }

    pub(crate) async fn run(mut self) {
        // Emitted here rather than during connect: the Client handle
        // exists by the time this task is first polled, so listeners
        // registered on the freshly returned handle still observe it.
        self.router.notify_connection(&ConnectionEvent::SessionActive {
            bound_jid: self.bound_jid.clone(),
        });

        let mut ping = self.ping_interval.map(|period| {
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });
        let ping_enabled = ping.is_some();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(stanza)) => {
                        if let Err(e) = self
                            .framed
                            .send(Packet::Element(stanza.to_element()))
                            .await
                        {
                            return self.close_on_error(e).await;
                        }
                    }
                    Some(Command::Fatal(error)) => return self.close_on_error(error).await,
                    Some(Command::Close) | None => return self.close_clean().await,
                },
                frame = self.framed.next() => match frame {
                    Some(Ok(Frame::Item(item))) => {
                        if let Err(e) = self.handle_item(item).await {
                            return self.close_on_error(e).await;
                        }
                    }
                    Some(Ok(Frame::StreamStart(_))) => {
                        let error =
                            ProtocolError::UnexpectedElement("stream:stream".to_owned());
                        return self.close_on_error(error.into()).await;
                    }
                    Some(Ok(Frame::StreamEnd)) => return self.close_clean().await,
                    Some(Err(e)) => return self.close_on_error(e).await,
                    None => return self.close_on_error(Error::Disconnected).await,
                },
                _ = async { ping.as_mut().unwrap().tick().await }, if ping_enabled => {
                    if let Err(e) = self.send_ping().await {
                        return self.close_on_error(e).await;
                    }
                }
            }
        }
    }

    async fn handle_item(&mut self, item: StreamItem) -> Result<(), Error> {
        match item {
            StreamItem::Stanza(Stanza::Iq(iq)) => match iq.typ {
                IqType::Get | IqType::Set => self.handle_request(iq).await?,
                IqType::Result | IqType::Error => {
                    match self.tracker.handle_response(iq) {
                        ControlFlow::Break(()) => {}
                        ControlFlow::Continue(iq) => {
                            self.router.dispatch_stanza(&Stanza::Iq(iq));
                        }
                    }
                }
            },
            StreamItem::Stanza(stanza) => self.router.dispatch_stanza(&stanza),
            StreamItem::StreamError(error) => return Err(ProtocolError::Stream(error).into()),
            StreamItem::Other(element) => {
                log::debug!("ignoring unknown stream element <{}/>", element.name());
            }
            other => return Err(ProtocolError::UnexpectedElement(other.name()).into()),
        }
        Ok(())
    }

    async fn handle_request(&mut self, iq: Iq) -> Result<(), Error> {
        let Some(handler) = self.router.handler_for(&iq) else {
            // No handler and no pending id: fan out, answer nothing.
            self.router.dispatch_stanza(&Stanza::Iq(iq));
            return Ok(());
        };
        match handler.mode() {
            HandlerMode::Sync => {
                let reply = run_handler(&*handler, &iq);
                self.framed.send(Packet::Element(reply.to_element())).await
            }
            HandlerMode::Async => {
                let command_tx = self.command_tx.clone();
                tokio::spawn(async move {
                    let reply =
                        tokio::task::spawn_blocking(move || run_handler(&*handler, &iq)).await;
                    match reply {
                        Ok(reply) => {
                            let _ = command_tx.send(Command::Send(Stanza::Iq(reply))).await;
                        }
                        Err(e) => log::warn!("IQ request handler panicked: {}", e),
                    }
                });
                Ok(())
            }
        }
    }

    /// Emits a keepalive ping and arms a watchdog that kills the
    /// connection if no reply arrives within the read timeout.
    async fn send_ping(&mut self) -> Result<(), Error> {
        let id = make_id();
        let iq = Iq::get(Payload::Ping(Ping))
            .with_to(self.server_jid.clone())
            .with_id(id.clone());
        let token = self.tracker.register(id, self.read_timeout);
        self.framed.send(Packet::Element(iq.to_element())).await?;

        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            match token.await {
                Ok(_) => log::trace!("keepalive pong received"),
                Err(Error::Timeout) => {
                    log::warn!("keepalive ping timed out, closing connection");
                    let _ = command_tx.send(Command::Fatal(Error::Timeout)).await;
                }
                Err(_) => {}
            }
        });
        Ok(())
    }

    async fn close_clean(mut self) {
        let _ = self.framed.send(Packet::StreamEnd).await;
        let _ = SinkExt::<Packet>::close(&mut self.framed).await;
        let first = self.state.close();
        self.tracker.fail_all(|| Error::Cancelled);
        if first {
            self.router.notify_connection(&ConnectionEvent::Closed);
        }
    }

    async fn close_on_error(mut self, error: Error) {
        log::warn!("closing connection: {}", error);
        let _ = self.framed.send(Packet::StreamEnd).await;
        let _ = SinkExt::<Packet>::close(&mut self.framed).await;
        let first = self.state.close();
        let cause = Arc::new(error);
        self.tracker
            .fail_all(|| Error::ClosedOnError(cause.clone()));
        if first {
            self.router
                .notify_connection(&ConnectionEvent::ClosedOnError(cause));
        }
    }
}

fn run_handler(handler: &dyn IqRequestHandler, iq: &Iq) -> Iq {
    match handler.handle(iq) {
        Ok(payload) => Iq::result_for(iq, payload),
        Err(error) => Iq::error_for(iq, error),
    }
}
