//! Bot bridge message types.
//!
//! The bridge is an external process hosting the actual game client. It is
//! reached over WebSocket and speaks one JSON object per text frame.
//!
//! | Message Type | Direction | Tag |
//! |--------------|-----------|-----|
//! | [`BridgeRequest`] | Local → Bridge | `op` |
//! | [`BridgeMessage`] | Bridge → Local | `event` |
//!
//! # Format
//!
//! ```json
//! { "op": "chat", "text": "/ability 1" }
//! { "event": "chat", "username": "Server", "message": "Lightning ability activated" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::protocol::TransportEvent;
use crate::session::{INVENTORY_SIZE, ItemStack, Position, SessionIdentity, Vitals};

// ============================================================================
// BridgeRequest
// ============================================================================

/// A request from the client to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BridgeRequest {
    /// Create the bot and log in.
    Open {
        /// Game server host.
        host: String,
        /// Game server port.
        port: u16,
        /// Player name.
        username: String,
        /// Account password, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        /// Protocol version hint; the bridge auto-detects when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },

    /// Send a chat line (commands included).
    Chat {
        /// Line to send.
        text: String,
    },

    /// Walk to a block position.
    Navigate {
        /// Block X.
        x: i32,
        /// Block Y.
        y: i32,
        /// Block Z.
        z: i32,
    },

    /// End the bot session.
    Close {
        /// Reason passed to the server.
        reason: String,
    },
}

impl BridgeRequest {
    /// Creates an open request for `identity`.
    #[must_use]
    pub fn open(identity: &SessionIdentity) -> Self {
        Self::Open {
            host: identity.host.clone(),
            port: identity.port,
            username: identity.username.clone(),
            password: identity.password.clone(),
            version: identity.version.clone(),
        }
    }
}

// ============================================================================
// BridgeMessage
// ============================================================================

/// A message from the bridge to the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeMessage {
    /// Bot logged in.
    Login,

    /// Chat line.
    Chat {
        /// Sender name.
        #[serde(default)]
        username: String,
        /// Message text.
        message: String,
    },

    /// Vitals update.
    Health {
        /// Health points.
        health: f32,
        /// Food level.
        food: f32,
        /// Saturation.
        saturation: f32,
    },

    /// Bot died.
    Death,

    /// Connection ended.
    End {
        /// Reason, if the bridge knows one.
        #[serde(default)]
        reason: Option<String>,
    },

    /// Bot error.
    Error {
        /// Error message.
        message: String,
    },

    /// Current entity position.
    Position {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
    },

    /// Full inventory snapshot.
    Inventory {
        /// Occupied slots.
        slots: Vec<BridgeSlot>,
    },
}

/// One occupied inventory slot reported by the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeSlot {
    /// Window slot index.
    pub slot: usize,
    /// Item type name.
    pub name: String,
    /// Stack size.
    pub count: u32,
    /// Human-readable item name.
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

impl BridgeMessage {
    /// Converts the message into a transport event.
    ///
    /// Returns `None` for position and inventory snapshots, which only
    /// refresh the transport's cached readings.
    #[must_use]
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self {
            Self::Login => Some(TransportEvent::Established),
            Self::Chat { username, message } => Some(TransportEvent::Chat {
                sender: username,
                message,
            }),
            Self::Health {
                health,
                food,
                saturation,
            } => Some(TransportEvent::VitalsChanged(Vitals {
                health,
                food,
                saturation,
            })),
            Self::Death => Some(TransportEvent::Died),
            Self::End { reason } => Some(TransportEvent::Terminated {
                reason: reason.unwrap_or_else(|| "bridge ended session".to_string()),
            }),
            Self::Error { message } => Some(TransportEvent::FatalError {
                descriptor: message,
            }),
            Self::Position { .. } | Self::Inventory { .. } => None,
        }
    }
}

/// Expands a sparse slot list into an indexed slot vector.
///
/// Slots outside the player window are skipped.
#[must_use]
pub fn slots_from_bridge(slots: Vec<BridgeSlot>) -> Vec<Option<ItemStack>> {
    let mut indexed = vec![None; INVENTORY_SIZE];

    for slot in slots {
        if slot.slot >= INVENTORY_SIZE {
            warn!(slot = slot.slot, item = %slot.name, "Ignoring out-of-range inventory slot");
            continue;
        }
        let display_name = slot.display_name.unwrap_or_else(|| slot.name.clone());
        indexed[slot.slot] = Some(ItemStack::new(slot.name, slot.count, display_name));
    }

    indexed
}

/// Floors a bridge position into block coordinates.
#[inline]
#[must_use]
pub fn block_position(x: f64, y: f64, z: f64) -> Position {
    Position::new(x.floor() as i32, y.floor() as i32, z.floor() as i32)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_str, json, to_value};

    #[test]
    fn test_open_request_skips_missing_fields() {
        let identity = SessionIdentity::new("localhost", 25565, "pilaf_test_player");
        let value = to_value(BridgeRequest::open(&identity)).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "open",
                "host": "localhost",
                "port": 25565,
                "username": "pilaf_test_player"
            })
        );
    }

    #[test]
    fn test_chat_request_format() {
        let value = to_value(BridgeRequest::Chat {
            text: "/ability 1".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "op": "chat", "text": "/ability 1" }));
    }

    #[test]
    fn test_login_maps_to_established() {
        let msg: BridgeMessage = from_str(r#"{"event":"login"}"#).unwrap();
        assert_eq!(msg.into_transport_event(), Some(TransportEvent::Established));
    }

    #[test]
    fn test_end_without_reason() {
        let msg: BridgeMessage = from_str(r#"{"event":"end"}"#).unwrap();
        assert!(matches!(
            msg.into_transport_event(),
            Some(TransportEvent::Terminated { .. })
        ));
    }

    #[test]
    fn test_position_is_not_forwarded() {
        let msg: BridgeMessage =
            from_str(r#"{"event":"position","x":10.7,"y":64.0,"z":-3.2}"#).unwrap();
        assert_eq!(msg.clone().into_transport_event(), None);
        if let BridgeMessage::Position { x, y, z } = msg {
            assert_eq!(block_position(x, y, z), Position::new(10, 64, -4));
        } else {
            panic!("Expected position message");
        }
    }

    #[test]
    fn test_inventory_slots_expand() {
        let msg: BridgeMessage = from_str(
            r#"{"event":"inventory","slots":[
                {"slot":45,"name":"dragon_egg","count":1,"displayName":"Dragon Egg"},
                {"slot":36,"name":"stone","count":64}
            ]}"#,
        )
        .unwrap();

        let BridgeMessage::Inventory { slots } = msg else {
            panic!("Expected inventory message");
        };
        let slots = slots_from_bridge(slots);

        assert_eq!(slots.len(), INVENTORY_SIZE);
        assert_eq!(slots[45].as_ref().unwrap().display_name, "Dragon Egg");
        assert_eq!(slots[36].as_ref().unwrap().display_name, "stone");
        assert!(slots[0].is_none());
    }

    #[test]
    fn test_out_of_range_slots_skipped() {
        let slots = vec![
            BridgeSlot {
                slot: usize::MAX,
                name: "bedrock".into(),
                count: 1,
                display_name: None,
            },
            BridgeSlot {
                slot: 1_000_000_000,
                name: "barrier".into(),
                count: 1,
                display_name: None,
            },
            BridgeSlot {
                slot: INVENTORY_SIZE,
                name: "stone".into(),
                count: 1,
                display_name: None,
            },
            BridgeSlot {
                slot: 45,
                name: "shield".into(),
                count: 1,
                display_name: None,
            },
        ];

        let indexed = slots_from_bridge(slots);

        assert_eq!(indexed.len(), INVENTORY_SIZE);
        assert_eq!(indexed.iter().flatten().count(), 1);
        assert_eq!(indexed[45].as_ref().unwrap().item_type, "shield");
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(from_str::<BridgeMessage>(r#"{"event":"spawn"}"#).is_err());
    }
}
