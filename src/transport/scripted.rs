//! Scripted in-memory transport.
//!
//! Stands in for a real game client in tests and harnesses. Events are
//! injected by hand (or automatically on open / on matching commands) and
//! every outbound call is recorded for later assertions.
//!
//! # Example
//!
//! ```ignore
//! let transport = ScriptedTransport::new()
//!     .with_auto_establish()
//!     .reply_to("ability", "Server", "Lightning ability activated!");
//!
//! let client = Client::builder().transport(transport.clone()).build()?;
//! client.connect().await?;
//! client.execute_command("ability 1").await?;
//! assert_eq!(transport.sent_chats(), ["/ability 1"]);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::TransportEvent;
use crate::session::{INVENTORY_SIZE, ItemStack, Position, SessionIdentity, Vitals};

use super::{EventStream, SessionTransport};

// ============================================================================
// Types
// ============================================================================

/// Chat line emitted when an outbound chat contains `needle`.
#[derive(Debug, Clone)]
struct AutoReply {
    needle: String,
    sender: String,
    message: String,
}

#[derive(Default)]
struct ScriptState {
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    auto_establish: bool,
    open_error: Option<String>,
    replies: Vec<AutoReply>,
    opened: Vec<SessionIdentity>,
    chats: Vec<String>,
    navigations: Vec<Position>,
    closes: Vec<String>,
    position: Option<Position>,
    slots: Vec<Option<ItemStack>>,
}

// ============================================================================
// ScriptedTransport
// ============================================================================

/// In-memory [`SessionTransport`].
///
/// Cloning yields another handle to the same script, so a test can keep one
/// clone as a controller while the client owns the other.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<ScriptState>>,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ScriptedTransport")
            .field("open", &state.events.is_some())
            .field("chats", &state.chats.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ScriptedTransport - Configuration
// ============================================================================

impl ScriptedTransport {
    /// Creates a transport that waits for manual events.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits [`TransportEvent::Established`] as soon as the session opens.
    #[must_use]
    pub fn with_auto_establish(self) -> Self {
        self.inner.lock().auto_establish = true;
        self
    }

    /// Makes [`SessionTransport::open`] fail with `message`.
    #[must_use]
    pub fn failing_open(self, message: impl Into<String>) -> Self {
        self.inner.lock().open_error = Some(message.into());
        self
    }

    /// Answers every outbound chat containing `needle` with a chat line.
    #[must_use]
    pub fn reply_to(
        self,
        needle: impl Into<String>,
        sender: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.inner.lock().replies.push(AutoReply {
            needle: needle.into(),
            sender: sender.into(),
            message: message.into(),
        });
        self
    }
}

// ============================================================================
// ScriptedTransport - Event Injection
// ============================================================================

impl ScriptedTransport {
    /// Pushes `event` onto the open stream.
    ///
    /// Returns `false` if no session is open.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let state = self.inner.lock();
        match state.events {
            Some(ref tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Emits a login.
    pub fn establish(&self) -> bool {
        self.emit(TransportEvent::Established)
    }

    /// Emits a chat line.
    pub fn chat(&self, sender: &str, message: &str) -> bool {
        self.emit(TransportEvent::Chat {
            sender: sender.to_string(),
            message: message.to_string(),
        })
    }

    /// Emits a vitals update.
    pub fn vitals(&self, health: f32, food: f32, saturation: f32) -> bool {
        self.emit(TransportEvent::VitalsChanged(Vitals {
            health,
            food,
            saturation,
        }))
    }

    /// Emits a death.
    pub fn die(&self) -> bool {
        self.emit(TransportEvent::Died)
    }

    /// Emits a graceful termination and ends the stream.
    pub fn terminate(&self, reason: &str) -> bool {
        let sent = self.emit(TransportEvent::Terminated {
            reason: reason.to_string(),
        });
        self.inner.lock().events = None;
        sent
    }

    /// Emits a fatal error and ends the stream.
    pub fn fail(&self, descriptor: &str) -> bool {
        let sent = self.emit(TransportEvent::FatalError {
            descriptor: descriptor.to_string(),
        });
        self.inner.lock().events = None;
        sent
    }

    /// Sets the position reported by [`SessionTransport::read_position`].
    pub fn set_position(&self, position: Position) {
        self.inner.lock().position = Some(position);
    }

    /// Places `item` in slot `index`, growing the inventory as needed.
    pub fn set_slot(&self, index: usize, item: Option<ItemStack>) {
        let mut state = self.inner.lock();
        let len = state.slots.len().max(INVENTORY_SIZE).max(index + 1);
        state.slots.resize(len, None);
        state.slots[index] = item;
    }
}

// ============================================================================
// ScriptedTransport - Recordings
// ============================================================================

impl ScriptedTransport {
    /// Returns every chat line sent, in order.
    #[must_use]
    pub fn sent_chats(&self) -> Vec<String> {
        self.inner.lock().chats.clone()
    }

    /// Returns every navigation target, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<Position> {
        self.inner.lock().navigations.clone()
    }

    /// Returns every close reason, in order.
    #[must_use]
    pub fn close_reasons(&self) -> Vec<String> {
        self.inner.lock().closes.clone()
    }

    /// Returns the identities passed to `open`.
    #[must_use]
    pub fn opened(&self) -> Vec<SessionIdentity> {
        self.inner.lock().opened.clone()
    }

    /// Returns `true` while a stream is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().events.is_some()
    }
}

// ============================================================================
// SessionTransport
// ============================================================================

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn open(&self, identity: &SessionIdentity) -> Result<EventStream> {
        let mut state = self.inner.lock();
        state.opened.push(identity.clone());

        if let Some(ref message) = state.open_error {
            return Err(Error::connection(message.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if state.auto_establish {
            let _ = tx.send(TransportEvent::Established);
        }
        state.events = Some(tx);

        debug!(%identity, "Scripted session opened");
        Ok(rx)
    }

    fn send_chat(&self, text: &str) -> Result<()> {
        let mut state = self.inner.lock();
        let Some(tx) = state.events.clone() else {
            return Err(Error::ConnectionClosed);
        };

        state.chats.push(text.to_string());
        for reply in state.replies.iter().filter(|r| text.contains(&r.needle)) {
            let _ = tx.send(TransportEvent::Chat {
                sender: reply.sender.clone(),
                message: reply.message.clone(),
            });
        }
        Ok(())
    }

    async fn navigate_to(&self, target: Position) -> Result<()> {
        let mut state = self.inner.lock();
        if state.events.is_none() {
            return Err(Error::ConnectionClosed);
        }
        state.navigations.push(target);
        state.position = Some(target);
        Ok(())
    }

    fn read_position(&self) -> Option<Position> {
        self.inner.lock().position
    }

    fn read_inventory_slots(&self) -> Vec<Option<ItemStack>> {
        self.inner.lock().slots.clone()
    }

    fn close(&self, reason: &str) {
        let mut state = self.inner.lock();
        state.closes.push(reason.to_string());
        if let Some(tx) = state.events.take() {
            let _ = tx.send(TransportEvent::Terminated {
                reason: reason.to_string(),
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
