//! Error types for the PILAF client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use pilaf_client::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     let reply = client.execute_command("ability 1").await?;
//!     println!("server said: {reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Lifecycle | [`Error::InvalidTransition`], [`Error::NotConnected`], [`Error::SessionEnded`] |
//! | Timeouts | [`Error::ConnectTimeout`], [`Error::CommandTimeout`] |
//! | Transport | [`Error::TransportFatal`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Protocol`] |
//! | Commands | [`Error::TooManyPendingCommands`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::session::ConnectionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// State machine misuse.
    ///
    /// Returned when a lifecycle transition is requested from a state that
    /// does not allow it, e.g. connecting twice.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// State the machine was in.
        from: ConnectionState,
        /// State that was requested.
        to: ConnectionState,
    },

    /// Operation requires a connected session.
    #[error("Bot not connected (state: {state})")]
    NotConnected {
        /// State the session was in when the operation was attempted.
        state: ConnectionState,
    },

    /// Session ended before the operation could complete.
    #[error("Session ended: {reason}")]
    SessionEnded {
        /// Reason reported by the transport.
        reason: String,
    },

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// Session was not established in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// No acknowledging chat message arrived in time.
    #[error("Command timeout after {timeout_ms}ms: {command}")]
    CommandTimeout {
        /// Command text that was sent.
        command: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Fatal error reported by the transport.
    #[error("Transport error: {message}")]
    TransportFatal {
        /// Descriptor reported by the transport.
        message: String,
    },

    /// Could not reach the transport endpoint.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport went away while the operation was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed frame from the bridge.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// Too many commands awaiting a response.
    #[error("Too many pending commands: {pending}/{max}")]
    TooManyPendingCommands {
        /// Commands currently in flight.
        pending: usize,
        /// Configured limit.
        max: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Malformed bridge URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(from: ConnectionState, to: ConnectionState) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: ConnectionState) -> Self {
        Self::NotConnected { state }
    }

    /// Creates a session ended error.
    #[inline]
    pub fn session_ended(reason: impl Into<String>) -> Self {
        Self::SessionEnded {
            reason: reason.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(timeout_ms: u64) -> Self {
        Self::ConnectTimeout { timeout_ms }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Creates a transport fatal error.
    #[inline]
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::TransportFatal {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::CommandTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::SessionEnded { .. }
                | Self::ConnectTimeout { .. }
                | Self::TransportFatal { .. }
                | Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Nothing is retried automatically; recoverable errors may succeed
    /// when the caller re-invokes the operation.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CommandTimeout { .. } | Self::TooManyPendingCommands { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
