//! Session transport layer.
//!
//! The transport is the external collaborator that actually speaks the
//! game protocol. The client only sees the narrow [`SessionTransport`]
//! capability interface:
//!
//! ```text
//! ┌─────────────────┐   TransportEvent stream   ┌─────────────────┐
//! │  Client (Rust)  │◄──────────────────────────│   Transport     │
//! │                 │                           │                 │
//! │  dispatcher     │──────────────────────────►│  game client    │
//! │  correlator     │   chat / navigate / close │  (bridge, mock) │
//! └─────────────────┘                           └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | WebSocket connection to an external bot bridge |
//! | `scripted` | In-memory transport for tests and harnesses |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket bot bridge transport.
pub mod bridge;

/// Scripted in-memory transport.
pub mod scripted;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::TransportEvent;
use crate::session::{ItemStack, Position, SessionIdentity};

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::BridgeTransport;
pub use scripted::ScriptedTransport;

// ============================================================================
// Types
// ============================================================================

/// Inbound event stream returned by [`SessionTransport::open`].
///
/// The stream ends when the transport is closed or fails.
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

// ============================================================================
// SessionTransport
// ============================================================================

/// Capability interface of a game session transport.
///
/// Synchronous methods must not block: they queue work or read cached
/// state.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Opens a session and returns its event stream.
    ///
    /// The stream yields [`TransportEvent::Established`] once the player
    /// has logged in.
    async fn open(&self, identity: &SessionIdentity) -> Result<EventStream>;

    /// Sends a chat line as the player.
    fn send_chat(&self, text: &str) -> Result<()>;

    /// Walks the player to `target` using the transport's navigation.
    async fn navigate_to(&self, target: Position) -> Result<()>;

    /// Returns the player's current block position, if known.
    fn read_position(&self) -> Option<Position>;

    /// Returns the indexed inventory slots.
    fn read_inventory_slots(&self) -> Vec<Option<ItemStack>>;

    /// Ends the session with `reason`.
    fn close(&self, reason: &str);
}
