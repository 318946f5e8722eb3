//! Client timing and command options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use pilaf_client::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_command_timeout(Duration::from_secs(5))
//!     .with_ack_token("Teleported");
//! ```
//!
//! Options also deserialize from JSON, with durations in milliseconds:
//!
//! ```json
//! { "connectTimeout": 15000, "ackTokens": ["ability", "Gave"] }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::CorrelatorSettings;
use crate::session::correlator::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_PENDING};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for login.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reason sent to the server on [`Client::disconnect`](crate::Client::disconnect).
pub const DEFAULT_DISCONNECT_REASON: &str = "PILAF test completed";

// ============================================================================
// ClientOptions
// ============================================================================

/// Timing and command configuration of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Time allowed between `connect()` and login.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,

    /// Time allowed for a command's response.
    #[serde(with = "millis")]
    pub command_timeout: Duration,

    /// Prefix prepended to command text.
    pub command_prefix: String,

    /// Chat tokens accepted as an acknowledgement.
    pub ack_tokens: Vec<String>,

    /// Reason sent to the server on disconnect.
    pub disconnect_reason: String,

    /// Maximum commands awaiting a response.
    pub max_pending_commands: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let correlator = CorrelatorSettings::default();
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            command_prefix: correlator.command_prefix,
            ack_tokens: correlator.ack_tokens,
            disconnect_reason: DEFAULT_DISCONNECT_REASON.to_string(),
            max_pending_commands: DEFAULT_MAX_PENDING,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the login timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command response timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the command prefix.
    #[inline]
    #[must_use]
    pub fn with_command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }

    /// Adds an acknowledgement token.
    #[inline]
    #[must_use]
    pub fn with_ack_token(mut self, token: impl Into<String>) -> Self {
        self.ack_tokens.push(token.into());
        self
    }

    /// Replaces the acknowledgement tokens.
    #[inline]
    #[must_use]
    pub fn with_ack_tokens(mut self, tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ack_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the disconnect reason.
    #[inline]
    #[must_use]
    pub fn with_disconnect_reason(mut self, reason: impl Into<String>) -> Self {
        self.disconnect_reason = reason.into();
        self
    }

    /// Sets the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending_commands(mut self, max: usize) -> Self {
        self.max_pending_commands = max;
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl ClientOptions {
    /// Returns the correlator part of these options.
    #[must_use]
    pub fn correlator_settings(&self) -> CorrelatorSettings {
        CorrelatorSettings {
            command_prefix: self.command_prefix.clone(),
            ack_tokens: self.ack_tokens.clone(),
            command_timeout: self.command_timeout,
            max_pending: self.max_pending_commands,
        }
    }
}

/// Durations as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_str, json, to_value};

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.command_timeout, Duration::from_secs(10));
        assert_eq!(options.command_prefix, "/");
        assert_eq!(options.ack_tokens, ["ability", "Lightning"]);
        assert_eq!(options.disconnect_reason, "PILAF test completed");
        assert_eq!(options.max_pending_commands, 100);
    }

    #[test]
    fn test_builder_chain() {
        let options = ClientOptions::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_command_prefix("!")
            .with_ack_token("Teleported")
            .with_max_pending_commands(4);

        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.command_prefix, "!");
        assert_eq!(options.ack_tokens, ["ability", "Lightning", "Teleported"]);
        assert_eq!(options.max_pending_commands, 4);
    }

    #[test]
    fn test_with_ack_tokens_replaces() {
        let options = ClientOptions::new().with_ack_tokens(["Gave"]);
        assert_eq!(options.ack_tokens, ["Gave"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: ClientOptions =
            from_str(r#"{"commandTimeout": 2500, "disconnectReason": "bye"}"#).unwrap();

        assert_eq!(options.command_timeout, Duration::from_millis(2500));
        assert_eq!(options.disconnect_reason, "bye");
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_serializes_millis() {
        let value = to_value(ClientOptions::new().with_connect_timeout(Duration::from_secs(1))).unwrap();
        assert_eq!(value["connectTimeout"], json!(1000));
        assert_eq!(value["maxPendingCommands"], json!(100));
    }

    #[test]
    fn test_correlator_settings() {
        let settings = ClientOptions::new()
            .with_command_timeout(Duration::from_secs(3))
            .correlator_settings();
        assert_eq!(settings.command_timeout, Duration::from_secs(3));
        assert_eq!(settings.max_pending, 100);
    }
}
