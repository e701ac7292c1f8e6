//! Correlation of outbound IQ requests to their asynchronous responses.

use core::future::Future;
use core::ops::ControlFlow;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;

use crate::error::Error;
use crate::stanza::error::StanzaError;
use crate::stanza::{Iq, IqType, Payload};

/// The outcome of an IQ request.
#[derive(Debug)]
pub enum IqResponse {
    /// A `result` reply, with its payload if any.
    Result(Option<Payload>),
    /// An `error` reply.
    Error(StanzaError),
}

struct IqResponseSink {
    inner: oneshot::Sender<Result<IqResponse, Error>>,
}

impl IqResponseSink {
    fn complete(self, response: Result<IqResponse, Error>) {
        let _: Result<_, _> = self.inner.send(response);
    }
}

type IqMap = HashMap<String, IqResponseSink>;

/// The pending-IQ table.
///
/// Every outbound `get`/`set` inserts exactly one entry; the entry leaves
/// the table on the first matching `result`/`error`, on the request's
/// deadline, when the token is dropped, or at session teardown.
#[derive(Clone)]
pub(crate) struct IqTracker {
    map: Arc<Mutex<IqMap>>,
}

impl IqTracker {
    pub(crate) fn new() -> IqTracker {
        IqTracker {
            map: Arc::new(Mutex::new(IqMap::new())),
        }
    }

    /// Inserts an entry for the request with stanza id `id` and returns
    /// the future completing with its response, or with
    /// [`Error::Timeout`] after `timeout`.
    pub(crate) fn register(&self, id: String, timeout: Duration) -> IqResponseToken {
        let (tx, rx) = oneshot::channel();
        let sink = IqResponseSink { inner: tx };
        self.map.lock().unwrap().insert(id.clone(), sink);
        IqResponseToken {
            entry: Some(MapEntryHandle {
                id,
                map: Arc::downgrade(&self.map),
            }),
            deadline: tokio::time::sleep(timeout),
            inner: rx,
        }
    }

    /// Attempts to route an inbound IQ as a response to a pending
    /// request. Returns the stanza unharmed if no request matches.
    pub(crate) fn handle_response(&self, iq: Iq) -> ControlFlow<(), Iq> {
        if !matches!(iq.typ, IqType::Result | IqType::Error) {
            return ControlFlow::Continue(iq);
        }
        let Some(id) = iq.id.clone() else {
            return ControlFlow::Continue(iq);
        };
        let sink = self.map.lock().unwrap().remove(&id);
        match sink {
            None => {
                log::debug!("no pending request for response IQ with id {:?}", id);
                ControlFlow::Continue(iq)
            }
            Some(sink) => {
                let response = match iq.typ {
                    IqType::Error => IqResponse::Error(
                        iq.error
                            .unwrap_or_else(|| StanzaError::cancel("undefined-condition")),
                    ),
                    _ => IqResponse::Result(iq.payloads.into_iter().next()),
                };
                sink.complete(Ok(response));
                ControlFlow::Break(())
            }
        }
    }

    /// Completes every pending entry with an error produced by
    /// `make_error`. Called exactly once at session teardown.
    pub(crate) fn fail_all<F: Fn() -> Error>(&self, make_error: F) {
        let sinks: Vec<(String, IqResponseSink)> =
            self.map.lock().unwrap().drain().collect();
        for (_, sink) in sinks {
            sink.complete(Err(make_error()));
        }
    }
}

struct MapEntryHandle {
    id: String,
    map: Weak<Mutex<IqMap>>,
}

impl Drop for MapEntryHandle {
    fn drop(&mut self) {
        let Some(map) = self.map.upgrade() else {
            return;
        };
        let Ok(mut map) = map.lock() else {
            return;
        };
        map.remove(&self.id);
    }
}

pin_project_lite::pin_project! {
    /// Handle for awaiting an IQ response.
    ///
    /// Completes with the response, with [`Error::Timeout`] once the
    /// request deadline passes, or with a teardown error if the session
    /// dies first. Dropping the token removes the internal bookkeeping
    /// for the response.
    pub struct IqResponseToken {
        entry: Option<MapEntryHandle>,
        #[pin]
        deadline: tokio::time::Sleep,
        #[pin]
        inner: oneshot::Receiver<Result<IqResponse, Error>>,
    }
}

impl Future for IqResponseToken {
    type Output = Result<IqResponse, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        match this.inner.poll(cx) {
            Poll::Ready(Ok(response)) => {
                this.entry.take();
                return Poll::Ready(response);
            }
            Poll::Ready(Err(_)) => {
                log::warn!("IQ response channel dropped without completion");
                this.entry.take();
                return Poll::Ready(Err(Error::Disconnected));
            }
            Poll::Pending => (),
        }
        match this.deadline.poll(cx) {
            // Dropping the entry handle removes the request from the
            // table; a late response is then dropped by the tracker.
            Poll::Ready(()) => {
                this.entry.take();
                Poll::Ready(Err(Error::Timeout))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza::Ping;

    fn response_iq(id: &str) -> Iq {
        Iq {
            id: Some(id.to_owned()),
            from: None,
            to: None,
            typ: IqType::Result,
            payloads: vec![Payload::Ping(Ping)],
            error: None,
        }
    }

    #[tokio::test]
    async fn response_completes_token_once() {
        let tracker = IqTracker::new();
        let token = tracker.register("q-1".to_owned(), Duration::from_secs(5));

        assert!(tracker.handle_response(response_iq("q-1")).is_break());
        match token.await {
            Ok(IqResponse::Result(Some(Payload::Ping(_)))) => {}
            other => panic!("unexpected token outcome: {:?}", other),
        }

        // The entry is gone; a second response with the same id is left
        // for the listeners.
        assert!(tracker.handle_response(response_iq("q-1")).is_continue());
    }

    #[tokio::test]
    async fn error_response_is_delivered_as_error() {
        let tracker = IqTracker::new();
        let token = tracker.register("q-2".to_owned(), Duration::from_secs(5));
        let mut iq = response_iq("q-2");
        iq.typ = IqType::Error;
        iq.error = Some(StanzaError::cancel("service-unavailable"));
        iq.payloads.clear();
        tracker.handle_response(iq);
        match token.await {
            Ok(IqResponse::Error(error)) => {
                assert_eq!(error.condition.as_deref(), Some("service-unavailable"));
            }
            other => panic!("unexpected token outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_completes_token_and_removes_entry() {
        let tracker = IqTracker::new();
        let token = tracker.register("q-3".to_owned(), Duration::from_millis(100));
        match token.await {
            Err(Error::Timeout) => {}
            other => panic!("unexpected token outcome: {:?}", other),
        }
        // Late response finds no entry.
        assert!(tracker.handle_response(response_iq("q-3")).is_continue());
    }

    #[tokio::test]
    async fn request_iqs_are_not_swallowed() {
        let tracker = IqTracker::new();
        let _token = tracker.register("q-4".to_owned(), Duration::from_secs(5));
        let mut iq = response_iq("q-4");
        iq.typ = IqType::Get;
        assert!(tracker.handle_response(iq).is_continue());
    }

    #[tokio::test]
    async fn teardown_fails_all_pending() {
        let tracker = IqTracker::new();
        let token_a = tracker.register("a".to_owned(), Duration::from_secs(5));
        let token_b = tracker.register("b".to_owned(), Duration::from_secs(5));
        tracker.fail_all(|| Error::Cancelled);
        assert!(matches!(token_a.await, Err(Error::Cancelled)));
        assert!(matches!(token_b.await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn dropping_token_removes_entry() {
        let tracker = IqTracker::new();
        let token = tracker.register("q-5".to_owned(), Duration::from_secs(5));
        drop(token);
        assert!(tracker.handle_response(response_iq("q-5")).is_continue());
    }
}
