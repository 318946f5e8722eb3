//! Connection lifecycle state machine.
//!
//! ```text
//! Disconnected ──begin──► Connecting ──established──► Connected
//!                              │                          │
//!                              └──── terminated ──► Ended ◄┘
//!                              └──── fatalError ──► Failed ◄┘
//! ```
//!
//! `Ended` and `Failed` are terminal and absorbing. Lifecycle transitions
//! publish `connected`, `end` and `error` events on the bus after the state
//! lock is released.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::SessionEvent;

use super::EventBus;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not yet connecting.
    #[default]
    Disconnected,
    /// Transport opened, waiting for login.
    Connecting,
    /// Logged in; commands may be issued.
    Connected,
    /// Ended gracefully.
    Ended,
    /// Failed with a fatal transport error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` for absorbing states.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }

    /// Returns `true` if commands may be issued.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the lowercase state name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ConnectionStateMachine
// ============================================================================

/// Shared lifecycle tracker.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ConnectionStateMachine {
    state: Arc<Mutex<ConnectionState>>,
    bus: EventBus,
}

impl fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionStateMachine {
    /// Creates a machine in [`ConnectionState::Disconnected`] publishing on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            bus,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Fails with [`Error::NotConnected`] unless connected.
    pub fn require_connected(&self) -> Result<()> {
        let state = self.state();
        if state.is_connected() {
            Ok(())
        } else {
            Err(Error::not_connected(state))
        }
    }

    /// Disconnected → Connecting.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] from any other state.
    pub fn begin(&self) -> Result<()> {
        self.transition(ConnectionState::Connecting, |s| {
            s == ConnectionState::Disconnected
        })?;
        Ok(())
    }

    /// Connecting → Connected; publishes `connected`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] from any other state.
    pub fn establish(&self) -> Result<()> {
        self.transition(ConnectionState::Connected, |s| {
            s == ConnectionState::Connecting
        })?;
        self.bus.publish(&SessionEvent::Connected);
        Ok(())
    }

    /// Any non-terminal state → Ended; publishes `end`.
    ///
    /// Returns `false` (and publishes nothing) if already terminal.
    pub fn end(&self, reason: &str) -> bool {
        if self.enter_terminal(ConnectionState::Ended) {
            self.bus.publish(&SessionEvent::End {
                reason: reason.to_string(),
            });
            true
        } else {
            false
        }
    }

    /// Any non-terminal state → Failed; publishes `error`.
    ///
    /// Returns `false` (and publishes nothing) if already terminal.
    pub fn fail(&self, descriptor: &str) -> bool {
        if self.enter_terminal(ConnectionState::Failed) {
            self.bus.publish(&SessionEvent::Error {
                message: descriptor.to_string(),
            });
            true
        } else {
            false
        }
    }

    fn enter_terminal(&self, to: ConnectionState) -> bool {
        self.transition(to, |s| !s.is_terminal()).is_ok()
    }

    /// Applies `to` if `allowed(current)`, returning the previous state.
    fn transition(
        &self,
        to: ConnectionState,
        allowed: impl FnOnce(ConnectionState) -> bool,
    ) -> Result<ConnectionState> {
        let mut state = self.state.lock();
        let from = *state;
        if !allowed(from) {
            return Err(Error::invalid_transition(from, to));
        }
        *state = to;
        drop(state);

        debug!(%from, %to, "State transition");
        Ok(from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::EventKind;

    fn machine() -> (ConnectionStateMachine, EventBus) {
        let bus = EventBus::new();
        (ConnectionStateMachine::new(bus.clone()), bus)
    }

    fn count(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<SessionEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(kind, move |e| seen_clone.lock().push(e.clone()));
        seen
    }

    #[test]
    fn test_initial_state() {
        let (machine, _) = machine();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(matches!(
            machine.require_connected(),
            Err(Error::NotConnected {
                state: ConnectionState::Disconnected
            })
        ));
    }

    #[test]
    fn test_happy_path_publishes_connected() {
        let (machine, bus) = machine();
        let connected = count(&bus, EventKind::Connected);

        machine.begin().unwrap();
        assert_eq!(machine.state(), ConnectionState::Connecting);
        machine.establish().unwrap();

        assert!(machine.is_connected());
        assert_eq!(connected.lock().len(), 1);
    }

    #[test]
    fn test_begin_twice_is_invalid() {
        let (machine, _) = machine();
        machine.begin().unwrap();
        let err = machine.begin().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ConnectionState::Connecting,
                to: ConnectionState::Connecting
            }
        ));
    }

    #[test]
    fn test_establish_requires_connecting() {
        let (machine, bus) = machine();
        let connected = count(&bus, EventKind::Connected);

        assert!(machine.establish().is_err());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(connected.lock().is_empty());
    }

    #[test]
    fn test_end_publishes_reason_once() {
        let (machine, bus) = machine();
        let ends = count(&bus, EventKind::End);

        machine.begin().unwrap();
        machine.establish().unwrap();
        assert!(machine.end("kicked"));
        assert!(!machine.end("again"));

        assert_eq!(machine.state(), ConnectionState::Ended);
        assert_eq!(
            *ends.lock(),
            vec![SessionEvent::End {
                reason: "kicked".into()
            }]
        );
    }

    #[test]
    fn test_terminal_states_absorb() {
        let (machine, bus) = machine();
        let errors = count(&bus, EventKind::Error);

        machine.begin().unwrap();
        assert!(machine.fail("ECONNREFUSED"));
        assert!(!machine.end("late end"));
        assert!(machine.establish().is_err());
        assert!(machine.begin().is_err());

        assert_eq!(machine.state(), ConnectionState::Failed);
        assert_eq!(errors.lock().len(), 1);
    }

    #[test]
    fn test_ended_never_reconnects() {
        let (machine, _) = machine();
        machine.begin().unwrap();
        machine.establish().unwrap();
        machine.end("bye");
        assert!(machine.establish().is_err());
        assert_eq!(machine.state(), ConnectionState::Ended);
    }

    #[test]
    fn test_end_from_disconnected() {
        let (machine, _) = machine();
        assert!(machine.end("never connected"));
        assert_eq!(machine.state(), ConnectionState::Ended);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
    }
}
