//! Session data model and the control-layer building blocks.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionStateMachine`] | Lifecycle tracking, publishes lifecycle events |
//! | [`EventBus`] | Kind-routed publish/subscribe with observer isolation |
//! | [`CommandCorrelator`] | Command issue and chat-response correlation |
//! | [`CommandQueue`] | Commands buffered until the session connects |
//! | [`Session`] | Identity plus last-known vitals, position and inventory |

// ============================================================================
// Submodules
// ============================================================================

/// Kind-routed event bus.
pub mod bus;

/// Command issue and response correlation.
pub mod correlator;

/// Inventory snapshot and slot-name table.
pub mod inventory;

/// Pre-connection command queue.
pub mod queue;

/// Connection lifecycle state machine.
pub mod state;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, EventCallback, Subscription};
pub use correlator::{CommandCorrelator, CorrelatorSettings, PendingCommand};
pub use inventory::{INVENTORY_SIZE, Inventory, ItemStack, slot_index};
pub use queue::CommandQueue;
pub use state::{ConnectionState, ConnectionStateMachine};

// ============================================================================
// SessionIdentity
// ============================================================================

/// Where to connect and as whom.
///
/// `Debug` output masks the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Game server host.
    pub host: String,
    /// Game server port.
    pub port: u16,
    /// Player name.
    pub username: String,
    /// Account password, if the server requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Protocol version hint, e.g. `1.20.4`. Auto-detected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SessionIdentity {
    /// Creates an identity without password or version hint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            version: None,
        }
    }
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("version", &self.version)
            .finish()
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

// ============================================================================
// Vitals
// ============================================================================

/// Health, food and saturation as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Health points (20 is full).
    pub health: f32,
    /// Food level (20 is full).
    pub food: f32,
    /// Food saturation.
    pub saturation: f32,
}

// ============================================================================
// Position
// ============================================================================

/// Block position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Last-known state of one session.
///
/// The connection state lives in [`ConnectionStateMachine`]; everything
/// else is cached here and only written by the client's dispatcher or by
/// refreshes from transport reads.
#[derive(Debug, Clone)]
pub struct Session {
    /// Connection target.
    pub identity: SessionIdentity,
    /// Last reported vitals.
    pub vitals: Option<Vitals>,
    /// Last read position.
    pub position: Option<Position>,
    /// Last read inventory.
    pub inventory: Inventory,
    /// Deaths observed during this session.
    pub deaths: u32,
}

impl Session {
    /// Creates an empty session for `identity`.
    #[must_use]
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            vitals: None,
            position: None,
            inventory: Inventory::default(),
            deaths: 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
