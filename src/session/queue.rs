//! Buffer for commands submitted before the session is connected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::protocol::Command;

use super::{CommandCorrelator, ConnectionStateMachine};

// ============================================================================
// Types
// ============================================================================

#[derive(Default)]
struct QueueState {
    entries: VecDeque<Command>,
    /// Set once drained; later commands bypass the buffer.
    open: bool,
}

// ============================================================================
// CommandQueue
// ============================================================================

/// FIFO of commands awaiting the `connected` transition.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct CommandQueue {
    state: Arc<Mutex<QueueState>>,
    machine: ConnectionStateMachine,
    correlator: CommandCorrelator,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CommandQueue")
            .field("len", &state.entries.len())
            .field("open", &state.open)
            .finish_non_exhaustive()
    }
}

impl CommandQueue {
    /// Creates an empty queue dispatching through `correlator`.
    #[must_use]
    pub fn new(machine: ConnectionStateMachine, correlator: CommandCorrelator) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            machine,
            correlator,
        }
    }

    /// Returns the number of buffered commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Buffers `command`, or dispatches it right away once drained.
    ///
    /// Commands submitted after the session ended are dropped.
    pub fn enqueue(&self, command: impl Into<Command>) {
        let command = command.into();
        let mut state = self.state.lock();

        if state.open {
            drop(state);
            self.dispatch(&command);
            return;
        }

        let current = self.machine.state();
        if current.is_terminal() {
            warn!(%command, state = %current, "Session over, dropping queued command");
            return;
        }

        state.entries.push_back(command);
        debug!(queued = state.entries.len(), "Command queued until connected");
    }

    /// Dispatches every buffered command in submission order.
    ///
    /// Holds the queue lock throughout, so an `enqueue` racing the drain
    /// lands after the buffered entries.
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        let entries = std::mem::take(&mut state.entries);
        let count = entries.len();

        for command in &entries {
            self.dispatch(command);
        }
        state.open = true;
        drop(state);

        if count > 0 {
            debug!(count, "Drained queued commands");
        }
        count
    }

    /// Discards buffered commands and closes the queue.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.open = false;
        drop(state);

        if count > 0 {
            warn!(count, "Discarding undispatched commands");
        }
        count
    }

    fn dispatch(&self, command: &Command) {
        if let Err(e) = self.correlator.dispatch(command) {
            error!(%command, error = %e, "Queued command failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::{CorrelatorSettings, EventBus, SessionIdentity};
    use crate::transport::{EventStream, ScriptedTransport, SessionTransport};

    async fn fixture() -> (
        CommandQueue,
        ConnectionStateMachine,
        ScriptedTransport,
        EventStream,
    ) {
        let bus = EventBus::new();
        let machine = ConnectionStateMachine::new(bus.clone());
        let transport = ScriptedTransport::new();
        let events = transport
            .open(&SessionIdentity::new("localhost", 25565, "tester"))
            .await
            .unwrap();
        let correlator = CommandCorrelator::new(
            bus,
            machine.clone(),
            Arc::new(transport.clone()),
            CorrelatorSettings::default(),
        );
        let queue = CommandQueue::new(machine.clone(), correlator);
        (queue, machine, transport, events)
    }

    #[tokio::test]
    async fn test_drain_is_fifo() {
        let (queue, machine, transport, _events) = fixture().await;
        machine.begin().unwrap();

        queue.enqueue("time set day");
        queue.enqueue("weather clear");
        queue.enqueue(Command::give("dragon_egg", 1));
        assert_eq!(queue.len(), 3);
        assert!(transport.sent_chats().is_empty());

        machine.establish().unwrap();
        assert_eq!(queue.drain(), 3);

        assert!(queue.is_empty());
        assert_eq!(
            transport.sent_chats(),
            ["/time set day", "/weather clear", "/give @s dragon_egg 1"]
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_drain_forwards() {
        let (queue, machine, transport, _events) = fixture().await;
        machine.begin().unwrap();
        queue.enqueue("first");
        machine.establish().unwrap();
        queue.drain();

        queue.enqueue("second");

        assert!(queue.is_empty());
        assert_eq!(transport.sent_chats(), ["/first", "/second"]);
    }

    #[tokio::test]
    async fn test_terminal_state_drops() {
        let (queue, machine, transport, _events) = fixture().await;
        machine.end("kicked");

        queue.enqueue("ability 1");

        assert!(queue.is_empty());
        assert!(transport.sent_chats().is_empty());
    }

    #[tokio::test]
    async fn test_clear_discards_and_closes() {
        let (queue, machine, transport, _events) = fixture().await;
        machine.begin().unwrap();
        machine.establish().unwrap();
        queue.drain();

        machine.end("bye");
        queue.clear();
        queue.enqueue("late");

        assert!(queue.is_empty());
        assert!(transport.sent_chats().is_empty());
    }

    #[tokio::test]
    async fn test_clear_counts_pending_entries() {
        let (queue, _machine, _transport, _events) = fixture().await;
        queue.enqueue("a");
        queue.enqueue("b");
        assert_eq!(queue.clear(), 2);
    }
}
