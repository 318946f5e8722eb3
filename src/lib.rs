//! PILAF client - Session control layer for a Minecraft player bot.
//!
//! This library drives a remote game-session client from Rust test code.
//! It does not speak the game protocol itself; that belongs to a
//! [`SessionTransport`], usually a [`BridgeTransport`] talking to an
//! external bot bridge over WebSocket.
//!
//! # Architecture
//!
//! ```text
//! SessionTransport ──events──► dispatcher ──► ConnectionStateMachine
//!        ▲                         │                  │
//!        │ chat                    ▼                  ▼
//! CommandCorrelator ◄──chat── EventBus ──────────► observers
//! ```
//!
//! Key design principles:
//!
//! - One dispatcher task per session applies every transport event in order
//! - Commands are confirmed by a matching chat line, never by a reply
//! - Observers are isolated: a panicking callback is logged and skipped
//! - Commands submitted before login are queued and sent FIFO on connect
//!
//! # Quick Start
//!
//! ```no_run
//! use pilaf_client::{BridgeTransport, Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .host("localhost")
//!         .port(25565)
//!         .username("pilaf_test_player")
//!         .transport(BridgeTransport::local()?)
//!         .build()?;
//!
//!     client.connect().await?;
//!     client.give_item("dragon_egg", 3)?;
//!     let reply = client.execute_command("ability 1").await?;
//!     println!("Server said: {}", reply);
//!
//!     client.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Session facade: [`Client`], [`ClientBuilder`], [`ClientOptions`] |
//! | [`session`] | State machine, event bus, correlator, queue, session model |
//! | [`protocol`] | Transport/session events, commands, bridge messages |
//! | [`transport`] | [`SessionTransport`] trait and implementations |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Session facade and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for subscriptions and commands.
pub mod identifiers;

/// Event, command and bridge message types.
pub mod protocol;

/// Session model and control-layer building blocks.
pub mod session;

/// Session transport layer.
///
/// The [`SessionTransport`] trait plus the bridge and scripted transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, SubscriptionId};

// Protocol types
pub use protocol::{Command, EventKind, ResponseMatcher, SessionEvent, TransportEvent};

// Session types
pub use session::{
    ConnectionState, EventBus, Inventory, ItemStack, Position, Session, SessionIdentity,
    Subscription, Vitals,
};

// Transport types
pub use transport::{BridgeTransport, EventStream, ScriptedTransport, SessionTransport};
