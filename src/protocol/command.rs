//! Command definitions and response matchers.
//!
//! Commands are sent as prefixed chat lines (`/give @s dragon_egg 3`). The
//! server never replies to a command directly, so each command type carries
//! a [`ResponseMatcher`]: a best-effort heuristic that recognises the chat
//! feedback the command is expected to produce.
//!
//! | Command | Text | Feedback tokens |
//! |---------|------|-----------------|
//! | [`Command::Raw`] | as given | configured ack tokens |
//! | [`Command::Give`] | `give @s <item> <count>` | `Gave` + ack tokens |
//! | [`Command::Equip`] | `replaceitem entity @s <slot> <item>` | `Replaced` + ack tokens |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Feedback token of the vanilla `give` command ("Gave 3 [Dragon Egg] to ...").
const GIVE_FEEDBACK: &str = "Gave";

/// Feedback token of the vanilla `replaceitem` command ("Replaced a slot on ...").
const EQUIP_FEEDBACK: &str = "Replaced";

// ============================================================================
// Command
// ============================================================================

/// A textual command issued as the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Arbitrary command text, without the leading prefix.
    Raw(String),

    /// Give items to the player.
    Give {
        /// Item type, e.g. `dragon_egg`.
        item: String,
        /// Stack size.
        count: u32,
    },

    /// Put an item into an equipment slot.
    Equip {
        /// Item type.
        item: String,
        /// Slot name; friendly names are mapped with [`vanilla_slot`].
        slot: String,
    },
}

impl Command {
    /// Creates a raw command.
    #[inline]
    #[must_use]
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    /// Creates a give command.
    #[inline]
    #[must_use]
    pub fn give(item: impl Into<String>, count: u32) -> Self {
        Self::Give {
            item: item.into(),
            count,
        }
    }

    /// Creates an equip command.
    #[inline]
    #[must_use]
    pub fn equip(item: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::Equip {
            item: item.into(),
            slot: slot.into(),
        }
    }

    /// Returns the command text without prefix.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Raw(text) => text.clone(),
            Self::Give { item, count } => format!("give @s {item} {count}"),
            Self::Equip { item, slot } => {
                format!("replaceitem entity @s {} {item}", vanilla_slot(slot))
            }
        }
    }

    /// Returns the chat line to send.
    ///
    /// Raw text that already starts with `prefix` is not prefixed twice.
    #[must_use]
    pub fn chat_line(&self, prefix: &str) -> String {
        let text = self.text();
        if !prefix.is_empty() && text.starts_with(prefix) {
            text
        } else {
            format!("{prefix}{text}")
        }
    }

    /// Returns the response matcher for this command type.
    #[must_use]
    pub fn matcher(&self, ack_tokens: &[String]) -> ResponseMatcher {
        let mut tokens = Vec::with_capacity(ack_tokens.len() + 1);
        match self {
            Self::Raw(_) => {}
            Self::Give { .. } => tokens.push(GIVE_FEEDBACK.to_string()),
            Self::Equip { .. } => tokens.push(EQUIP_FEEDBACK.to_string()),
        }
        tokens.extend(ack_tokens.iter().cloned());
        ResponseMatcher::Tokens(tokens)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::raw(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

/// Maps a friendly slot name to its vanilla slot identifier.
///
/// Unknown names pass through unchanged.
#[must_use]
pub fn vanilla_slot(slot: &str) -> &str {
    match slot {
        "mainhand" => "weapon.mainhand",
        "offhand" => "weapon.offhand",
        "helmet" => "armor.head",
        "chestplate" => "armor.chest",
        "leggings" => "armor.legs",
        "boots" => "armor.feet",
        other => other,
    }
}

// ============================================================================
// ResponseMatcher
// ============================================================================

/// Predicate deciding whether a chat line answers a command.
///
/// Matching is heuristic: unrelated chat that happens to contain a token is
/// accepted too.
#[derive(Debug, Clone)]
pub enum ResponseMatcher {
    /// Accepts lines containing any of the tokens (case-sensitive).
    Tokens(Vec<String>),
    /// Accepts lines matching the regex.
    Pattern(Regex),
    /// Accepts every line.
    Any,
}

impl ResponseMatcher {
    /// Creates a token matcher.
    #[must_use]
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tokens(tokens.into_iter().map(Into::into).collect())
    }

    /// Creates a regex matcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::config(format!("Invalid response pattern: {e}")))
    }

    /// Returns `true` if `message` is accepted.
    #[must_use]
    pub fn matches(&self, message: &str) -> bool {
        match self {
            Self::Tokens(tokens) => tokens.iter().any(|t| message.contains(t.as_str())),
            Self::Pattern(regex) => regex.is_match(message),
            Self::Any => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
