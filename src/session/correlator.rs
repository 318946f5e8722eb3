//! Command issue and chat-response correlation.
//!
//! The server never answers a command directly. The correlator therefore
//! registers a transient chat subscription per command, sends the command
//! as a prefixed chat line, and races the command's [`ResponseMatcher`]
//! against a deadline:
//!
//! ```text
//! issue() ── subscribe(chat) ── send_chat("/cmd") ──► PendingCommand
//!                                                        │ wait()
//!                         first matching chat line ──────┤──► Ok(line)
//!                         deadline elapsed ──────────────┤──► CommandTimeout
//!                         cancel_all() (teardown) ───────┘──► ConnectionClosed
//! ```
//!
//! Whichever path wins, the subscription is removed. Correlation is a
//! best-effort heuristic: every pending matcher sees every chat line, so one
//! line can settle several commands whose matchers overlap.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Command, EventKind, ResponseMatcher};
use crate::transport::SessionTransport;

use super::{ConnectionStateMachine, EventBus, Subscription};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for an acknowledging chat line.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum of commands awaiting a response.
pub const DEFAULT_MAX_PENDING: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// One-shot slot settled by whichever path wins.
type Responder = Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>;

struct PendingEntry {
    command: String,
    subscription: Subscription,
    responder: Responder,
}

/// In-flight commands by ID.
type PendingMap = FxHashMap<CommandId, PendingEntry>;

// ============================================================================
// CorrelatorSettings
// ============================================================================

/// Correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorSettings {
    /// Prefix marking a chat line as a command.
    pub command_prefix: String,
    /// Tokens accepted as acknowledgement of any command.
    pub ack_tokens: Vec<String>,
    /// Deadline per command.
    pub command_timeout: Duration,
    /// Maximum commands in flight.
    pub max_pending: usize,
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            command_prefix: "/".to_string(),
            ack_tokens: vec!["ability".to_string(), "Lightning".to_string()],
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

// ============================================================================
// CommandCorrelator
// ============================================================================

struct CorrelatorInner {
    bus: EventBus,
    machine: ConnectionStateMachine,
    transport: Arc<dyn SessionTransport>,
    settings: CorrelatorSettings,
    pending: Mutex<PendingMap>,
}

/// Issues commands and correlates their chat responses.
///
/// Cloning yields another handle to the same pending set.
#[derive(Clone)]
pub struct CommandCorrelator {
    inner: Arc<CorrelatorInner>,
}

impl fmt::Debug for CommandCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandCorrelator")
            .field("pending", &self.pending_count())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl CommandCorrelator {
    /// Creates a correlator sending over `transport` and listening on `bus`.
    #[must_use]
    pub fn new(
        bus: EventBus,
        machine: ConnectionStateMachine,
        transport: Arc<dyn SessionTransport>,
        settings: CorrelatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(CorrelatorInner {
                bus,
                machine,
                transport,
                settings,
                pending: Mutex::new(PendingMap::default()),
            }),
        }
    }

    /// Returns the settings.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CorrelatorSettings {
        &self.inner.settings
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Sends `command` and waits for its response.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the session is not connected
    /// - [`Error::TooManyPendingCommands`] if the in-flight limit is reached
    /// - [`Error::CommandTimeout`] if no matching chat line arrives in time
    /// - [`Error::ConnectionClosed`] if the session is torn down meanwhile
    pub async fn execute(&self, command: &Command) -> Result<String> {
        self.issue(command)?.wait().await
    }

    /// Sends `command` without waiting; the outcome is only logged.
    ///
    /// Precondition failures are still returned.
    pub fn dispatch(&self, command: &Command) -> Result<()> {
        let pending = self.issue(command)?;
        tokio::spawn(async move {
            let command = pending.command().to_string();
            match pending.wait().await {
                Ok(response) => debug!(%command, %response, "Command acknowledged"),
                Err(e) => error!(%command, error = %e, "Command failed"),
            }
        });
        Ok(())
    }

    /// Sends `command` using its default matcher and timeout.
    pub fn issue(&self, command: &Command) -> Result<PendingCommand> {
        let settings = &self.inner.settings;
        self.issue_with(
            command,
            command.matcher(&settings.ack_tokens),
            settings.command_timeout,
        )
    }

    /// Sends `command`, accepting responses with `matcher` until `deadline`.
    ///
    /// The chat subscription is registered before the line is sent, so a
    /// response cannot overtake it.
    pub fn issue_with(
        &self,
        command: &Command,
        matcher: ResponseMatcher,
        deadline: Duration,
    ) -> Result<PendingCommand> {
        self.inner.machine.require_connected()?;

        let max = self.inner.settings.max_pending;
        let pending = self.pending_count();
        if pending >= max {
            warn!(pending, max, "Too many pending commands");
            return Err(Error::TooManyPendingCommands { pending, max });
        }

        let id = CommandId::generate();
        let line = command.chat_line(&self.inner.settings.command_prefix);
        let (tx, rx) = oneshot::channel();
        let responder: Responder = Arc::new(Mutex::new(Some(tx)));

        let responder_clone = Arc::clone(&responder);
        let subscription = self.inner.bus.subscribe(EventKind::Chat, move |event| {
            if let Some(message) = event.chat_message()
                && matcher.matches(message)
                && let Some(tx) = responder_clone.lock().take()
            {
                debug!(command_id = %id, %message, "Command response matched");
                let _ = tx.send(Ok(message.to_string()));
            }
        });

        self.inner.pending.lock().insert(
            id,
            PendingEntry {
                command: line.clone(),
                subscription,
                responder,
            },
        );

        debug!(command_id = %id, command = %line, "Executing command");
        if let Err(e) = self.inner.transport.send_chat(&line) {
            self.remove(id);
            return Err(e);
        }

        Ok(PendingCommand {
            id,
            command: line,
            deadline,
            rx,
            correlator: self.clone(),
        })
    }

    /// Settles every pending command with [`Error::ConnectionClosed`].
    ///
    /// Returns the number of commands cancelled.
    pub fn cancel_all(&self) -> usize {
        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        let count = pending.len();

        for (_, entry) in pending {
            self.inner.bus.unsubscribe(&entry.subscription);
            if let Some(tx) = entry.responder.lock().take() {
                let _ = tx.send(Err(Error::ConnectionClosed));
            }
            debug!(command = %entry.command, "Cancelled pending command");
        }

        if count > 0 {
            debug!(count, "Cancelled pending commands on teardown");
        }
        count
    }

    /// Forgets `id` and removes its subscription.
    fn remove(&self, id: CommandId) {
        let entry = self.inner.pending.lock().remove(&id);
        if let Some(entry) = entry {
            self.inner.bus.unsubscribe(&entry.subscription);
        }
    }
}

// ============================================================================
// PendingCommand
// ============================================================================

/// A sent command awaiting its response.
///
/// Dropping it unsettled removes its subscription.
pub struct PendingCommand {
    id: CommandId,
    command: String,
    deadline: Duration,
    rx: oneshot::Receiver<Result<String>>,
    correlator: CommandCorrelator,
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PendingCommand {
    /// Returns the command ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Returns the chat line that was sent.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Waits for the first matching response or the deadline.
    pub async fn wait(mut self) -> Result<String> {
        match timeout(self.deadline, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let timeout_ms = self.deadline.as_millis() as u64;
                warn!(command_id = %self.id, command = %self.command, timeout_ms, "Command timeout");
                Err(Error::command_timeout(self.command.clone(), timeout_ms))
            }
        }
    }
}

impl Drop for PendingCommand {
    fn drop(&mut self) {
        self.correlator.remove(self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::SessionEvent;
    use crate::session::{ConnectionState, SessionIdentity};
    use crate::transport::{EventStream, ScriptedTransport};

    struct Fixture {
        bus: EventBus,
        machine: ConnectionStateMachine,
        transport: ScriptedTransport,
        correlator: CommandCorrelator,
        _events: EventStream,
    }

    async fn connected_with(settings: CorrelatorSettings) -> Fixture {
        let bus = EventBus::new();
        let machine = ConnectionStateMachine::new(bus.clone());
        let transport = ScriptedTransport::new();
        let events = transport
            .open(&SessionIdentity::new("localhost", 25565, "tester"))
            .await
            .unwrap();
        machine.begin().unwrap();
        machine.establish().unwrap();

        let correlator = CommandCorrelator::new(
            bus.clone(),
            machine.clone(),
            Arc::new(transport.clone()),
            settings,
        );

        Fixture {
            bus,
            machine,
            transport,
            correlator,
            _events: events,
        }
    }

    async fn connected() -> Fixture {
        connected_with(CorrelatorSettings::default()).await
    }

    #[tokio::test]
    async fn test_not_connected_has_no_side_effect() {
        let bus = EventBus::new();
        let machine = ConnectionStateMachine::new(bus.clone());
        let transport = ScriptedTransport::new();
        let correlator = CommandCorrelator::new(
            bus.clone(),
            machine,
            Arc::new(transport.clone()),
            CorrelatorSettings::default(),
        );

        let err = correlator
            .execute(&Command::raw("give @s dragon_egg 3"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::NotConnected {
                state: ConnectionState::Disconnected
            }
        ));
        assert!(transport.sent_chats().is_empty());
        assert_eq!(bus.total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_response_resolves_and_unsubscribes() {
        let f = connected().await;

        let pending = f.correlator.issue(&Command::raw("give @s dragon_egg 3")).unwrap();
        assert_eq!(f.transport.sent_chats(), ["/give @s dragon_egg 3"]);
        assert_eq!(f.bus.subscriber_count(EventKind::Chat), 1);

        f.bus.publish(&SessionEvent::chat("Steve", "unrelated chatter"));
        f.bus
            .publish(&SessionEvent::chat("Server", "Lightning ability unlocked"));

        let response = pending.wait().await.unwrap();
        assert_eq!(response, "Lightning ability unlocked");
        assert_eq!(f.bus.subscriber_count(EventKind::Chat), 0);
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_resolves_once_with_first_match() {
        let f = connected().await;

        let pending = f.correlator.issue(&Command::raw("ability 1")).unwrap();
        f.bus.publish(&SessionEvent::chat("Server", "ability first"));
        f.bus.publish(&SessionEvent::chat("Server", "ability second"));

        assert_eq!(pending.wait().await.unwrap(), "ability first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_subscription() {
        let f = connected().await;

        let err = f
            .correlator
            .execute(&Command::raw("give @s dragon_egg 3"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CommandTimeout { timeout_ms: 10_000, .. }
        ));
        assert_eq!(f.bus.subscriber_count(EventKind::Chat), 0);
        assert_eq!(f.bus.publish(&SessionEvent::chat("Server", "ability")), 0);
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_matcher_and_deadline() {
        let f = connected().await;

        let pending = f
            .correlator
            .issue_with(
                &Command::raw("time query daytime"),
                ResponseMatcher::pattern(r"^The time is \d+$").unwrap(),
                Duration::from_secs(2),
            )
            .unwrap();
        f.bus.publish(&SessionEvent::chat("", "The time is 1000"));

        assert_eq!(pending.wait().await.unwrap(), "The time is 1000");
    }

    #[tokio::test]
    async fn test_overlapping_matchers_both_resolve() {
        // Both matchers accept the same line; which one "owns" it is
        // undefined, so only assert that each settles with it.
        let f = connected().await;

        let first = f.correlator.issue(&Command::raw("ability 1")).unwrap();
        let second = f.correlator.issue(&Command::raw("ability 2")).unwrap();
        f.bus.publish(&SessionEvent::chat("Server", "Lightning ability"));

        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a.unwrap(), "Lightning ability");
        assert_eq!(b.unwrap(), "Lightning ability");
    }

    #[tokio::test]
    async fn test_cancel_all_settles_pending() {
        let f = connected().await;

        let pending = f.correlator.issue(&Command::raw("ability 1")).unwrap();
        assert_eq!(f.correlator.cancel_all(), 1);

        assert!(matches!(
            pending.wait().await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(f.bus.total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_subscription() {
        let f = connected().await;

        let pending = f.correlator.issue(&Command::raw("ability 1")).unwrap();
        drop(pending);

        assert_eq!(f.bus.total_subscribers(), 0);
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_limit() {
        let f = connected_with(CorrelatorSettings {
            max_pending: 1,
            ..Default::default()
        })
        .await;

        let _first = f.correlator.issue(&Command::raw("ability 1")).unwrap();
        let err = f.correlator.issue(&Command::raw("ability 2")).unwrap_err();

        assert!(matches!(
            err,
            Error::TooManyPendingCommands { pending: 1, max: 1 }
        ));
        assert_eq!(f.transport.sent_chats().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_no_subscription() {
        let f = connected().await;
        f.transport.terminate("gone");

        let err = f.correlator.issue(&Command::raw("ability 1")).unwrap_err();

        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(f.bus.total_subscribers(), 0);
        assert!(f.machine.is_connected());
    }

    #[tokio::test]
    async fn test_give_uses_vanilla_feedback() {
        let f = connected().await;

        let pending = f.correlator.issue(&Command::give("dragon_egg", 3)).unwrap();
        f.bus
            .publish(&SessionEvent::chat("", "Gave 3 [Dragon Egg] to tester"));

        assert_eq!(
            pending.wait().await.unwrap(),
            "Gave 3 [Dragon Egg] to tester"
        );
    }
}
