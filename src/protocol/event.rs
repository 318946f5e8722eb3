//! Event types.
//!
//! Two layers of events flow through the client:
//!
//! | Type | Producer | Consumer |
//! |------|----------|----------|
//! | [`TransportEvent`] | transport | client dispatcher |
//! | [`SessionEvent`] | client dispatcher | event bus observers |
//!
//! Observers subscribe by [`EventKind`], whose string tags are
//! `connected`, `chat`, `health`, `death`, `end` and `error`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::session::Vitals;

// ============================================================================
// TransportEvent
// ============================================================================

/// Raw signal emitted by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The player logged in; the session is usable.
    Established,

    /// A chat line was received.
    Chat {
        /// Name of the sending player (empty for server messages).
        sender: String,
        /// Message text.
        message: String,
    },

    /// Health, food or saturation changed.
    VitalsChanged(Vitals),

    /// The player died.
    Died,

    /// The session ended gracefully (kick, server shutdown, close).
    Terminated {
        /// Reason reported by the server or bridge.
        reason: String,
    },

    /// The transport failed irrecoverably.
    FatalError {
        /// Error descriptor.
        descriptor: String,
    },
}

impl TransportEvent {
    /// Returns `true` for signals after which no further events arrive.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated { .. } | Self::FatalError { .. })
    }

    /// Short name used in log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Established => "established",
            Self::Chat { .. } => "chat",
            Self::VitalsChanged(_) => "vitalsChanged",
            Self::Died => "died",
            Self::Terminated { .. } => "terminated",
            Self::FatalError { .. } => "fatalError",
        }
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Tag classifying a [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Session reached the connected state.
    Connected,
    /// Chat line received.
    Chat,
    /// Vitals changed.
    Health,
    /// Player died.
    Death,
    /// Session ended.
    End,
    /// Session failed.
    Error,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        Self::Connected,
        Self::Chat,
        Self::Health,
        Self::Death,
        Self::End,
        Self::Error,
    ];

    /// Returns the string tag.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Chat => "chat",
            Self::Health => "health",
            Self::Death => "death",
            Self::End => "end",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::config(format!("Unknown event kind: {s}")))
    }
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Semantic event delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session is connected and queued commands are about to drain.
    Connected,

    /// Chat line received.
    Chat {
        /// Sending player.
        sender: String,
        /// Message text.
        message: String,
    },

    /// Latest vitals.
    Health(Vitals),

    /// Player died.
    Death,

    /// Session ended.
    End {
        /// Termination reason.
        reason: String,
    },

    /// Session failed.
    Error {
        /// Error descriptor.
        message: String,
    },
}

impl SessionEvent {
    /// Returns the kind used for subscription routing.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Chat { .. } => EventKind::Chat,
            Self::Health(_) => EventKind::Health,
            Self::Death => EventKind::Death,
            Self::End { .. } => EventKind::End,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// Creates a chat event.
    #[inline]
    #[must_use]
    pub fn chat(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chat {
            sender: sender.into(),
            message: message.into(),
        }
    }

    /// Returns the message text for chat events.
    #[inline]
    #[must_use]
    pub fn chat_message(&self) -> Option<&str> {
        match self {
            Self::Chat { message, .. } => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
