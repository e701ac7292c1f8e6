//! The authoritative connection state.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// The lifecycle state of a connection.
///
/// The only mutation path is the transition primitive held by the
/// connection internals; every edge is validated against the allow-list
/// below, and an edge outside it is a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Nothing has happened yet.
    Initial = 0,
    /// TCP (and, for direct TLS, the TLS handshake) in progress.
    Connecting = 1,
    /// Stream prologue sent, waiting for `<stream:features/>`.
    AwaitingFeatures = 2,
    /// `<starttls/>` sent, waiting for `<proceed/>`.
    TlsNegotiating = 3,
    /// SASL exchange in progress.
    SaslAuth = 4,
    /// Bind IQ sent, waiting for the bound JID.
    Binding = 5,
    /// The session is up; stanzas flow.
    SessionActive = 6,
    /// Terminal.
    Closed = 7,
}

impl ConnectionState {
    fn from_u8(value: u8) -> ConnectionState {
        match value {
            0 => ConnectionState::Initial,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::AwaitingFeatures,
            3 => ConnectionState::TlsNegotiating,
            4 => ConnectionState::SaslAuth,
            5 => ConnectionState::Binding,
            6 => ConnectionState::SessionActive,
            _ => ConnectionState::Closed,
        }
    }
}

fn allowed(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    // Any state may be closed (close-on-error); everything else follows
    // the negotiation sequence, with AwaitingFeatures re-entered after
    // the STARTTLS and SASL stream restarts.
    if to == Closed {
        return from != Closed;
    }
    matches!(
        (from, to),
        (Initial, Connecting)
            | (Connecting, AwaitingFeatures)
            | (AwaitingFeatures, TlsNegotiating)
            | (AwaitingFeatures, SaslAuth)
            | (AwaitingFeatures, Binding)
            | (TlsNegotiating, AwaitingFeatures)
            | (SaslAuth, AwaitingFeatures)
            | (Binding, SessionActive)
    )
}

struct StateInner {
    state: AtomicU8,
    authenticated: AtomicBool,
    transition_lock: Mutex<()>,
}

/// Shared handle to the connection state variable.
#[derive(Clone)]
pub(crate) struct StateHandle {
    inner: Arc<StateInner>,
}

impl StateHandle {
    pub(crate) fn new() -> StateHandle {
        StateHandle {
            inner: Arc::new(StateInner {
                state: AtomicU8::new(ConnectionState::Initial as u8),
                authenticated: AtomicBool::new(false),
                transition_lock: Mutex::new(()),
            }),
        }
    }

    /// Lock-free read of the current state.
    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    pub(crate) fn set_authenticated(&self) {
        self.inner.authenticated.store(true, Ordering::SeqCst);
    }

    /// Performs a state transition, validated against the allow-list.
    ///
    /// # Panics
    ///
    /// Panics on an edge outside the allow-list; such an edge is a bug in
    /// this crate, never a server-triggered condition.
    pub(crate) fn transition(&self, to: ConnectionState) {
        let _guard = self.inner.transition_lock.lock().unwrap();
        let from = self.state();
        assert!(
            allowed(from, to),
            "illegal connection state transition {:?} -> {:?}",
            from,
            to
        );
        self.inner.state.store(to as u8, Ordering::SeqCst);
        log::debug!("connection state {:?} -> {:?}", from, to);
    }

    /// Moves to `Closed` from any state. Returns whether this call was the
    /// one that performed the transition (callers use this to notify
    /// listeners exactly once).
    pub(crate) fn close(&self) -> bool {
        let _guard = self.inner.transition_lock.lock().unwrap();
        let from = self.state();
        if from == ConnectionState::Closed {
            return false;
        }
        self.inner
            .state
            .store(ConnectionState::Closed as u8, Ordering::SeqCst);
        log::debug!("connection state {:?} -> Closed", from);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bringup_sequence_is_allowed() {
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        state.transition(ConnectionState::AwaitingFeatures);
        state.transition(ConnectionState::TlsNegotiating);
        state.transition(ConnectionState::AwaitingFeatures);
        state.transition(ConnectionState::SaslAuth);
        state.transition(ConnectionState::AwaitingFeatures);
        state.transition(ConnectionState::Binding);
        state.transition(ConnectionState::SessionActive);
        assert_eq!(state.state(), ConnectionState::SessionActive);
    }

    #[test]
    #[should_panic(expected = "illegal connection state transition")]
    fn skipping_connecting_panics() {
        let state = StateHandle::new();
        state.transition(ConnectionState::AwaitingFeatures);
    }

    #[test]
    #[should_panic(expected = "illegal connection state transition")]
    fn session_cannot_reenter_negotiation() {
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        state.transition(ConnectionState::AwaitingFeatures);
        state.transition(ConnectionState::Binding);
        state.transition(ConnectionState::SessionActive);
        state.transition(ConnectionState::AwaitingFeatures);
    }

    #[test]
    fn close_is_idempotent_and_reports_first_call() {
        let state = StateHandle::new();
        state.transition(ConnectionState::Connecting);
        assert!(state.close());
        assert!(!state.close());
        assert_eq!(state.state(), ConnectionState::Closed);
    }

    #[test]
    fn authenticated_flag() {
        let state = StateHandle::new();
        assert!(!state.is_authenticated());
        state.set_authenticated();
        assert!(state.is_authenticated());
    }
}
