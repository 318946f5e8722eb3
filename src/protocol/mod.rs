//! Event, command and bridge message types.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `TransportEvent` | Transport → Client | Raw session signal |
//! | `SessionEvent` | Client → Observers | Semantic event on the bus |
//! | `Command` | Client → Transport | Prefixed chat command |
//! | `BridgeRequest` / `BridgeMessage` | WebSocket | Bot bridge envelope |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command builders and response matchers |
//! | `event` | Transport and session events |
//! | `message` | Bot bridge JSON messages |

// ============================================================================
// Submodules
// ============================================================================

/// Command builders and response matchers.
pub mod command;

/// Transport and session event types.
pub mod event;

/// Bot bridge JSON messages.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, ResponseMatcher, vanilla_slot};
pub use event::{EventKind, SessionEvent, TransportEvent};
pub use message::{BridgeMessage, BridgeRequest, BridgeSlot};
