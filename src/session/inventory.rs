//! Inventory snapshot and slot-name table.
//!
//! Slots use the player inventory window layout: armor at 5-8, the hotbar
//! at 36-44 and the offhand at 45.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Number of slots in the player inventory window.
pub const INVENTORY_SIZE: usize = 46;

/// Slot of the first hotbar entry, treated as the main hand.
pub const MAINHAND_SLOT: usize = 36;

/// Offhand slot.
pub const OFFHAND_SLOT: usize = 45;

/// Slot name meaning "anywhere in the inventory".
pub const ANY_SLOT: &str = "any";

// ============================================================================
// ItemStack
// ============================================================================

/// One stack of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type name, e.g. `dragon_egg`.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Stack size.
    pub count: u32,
    /// Human-readable name, e.g. `Dragon Egg`.
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl ItemStack {
    /// Creates an item stack.
    #[inline]
    #[must_use]
    pub fn new(item_type: impl Into<String>, count: u32, display_name: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            count,
            display_name: display_name.into(),
        }
    }
}

// ============================================================================
// Slot Table
// ============================================================================

/// Resolves a slot name to its window index.
///
/// Unrecognised names resolve to the main hand (36) rather than failing.
#[must_use]
pub fn slot_index(slot: &str) -> usize {
    match slot {
        "mainhand" => MAINHAND_SLOT,
        "offhand" => OFFHAND_SLOT,
        "helmet" => 5,
        "chestplate" => 6,
        "leggings" => 7,
        "boots" => 8,
        _ => MAINHAND_SLOT,
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Indexed inventory slots; `None` is an empty slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    /// Creates an inventory from indexed slots.
    #[inline]
    #[must_use]
    pub fn from_slots(slots: Vec<Option<ItemStack>>) -> Self {
        Self { slots }
    }

    /// Returns the item in slot `index`.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Returns the occupied slots in slot order.
    #[must_use]
    pub fn items(&self) -> Vec<ItemStack> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Checks for `item_type` in the named slot, or anywhere for `"any"`.
    #[must_use]
    pub fn has_item(&self, item_type: &str, slot: &str) -> bool {
        if slot == ANY_SLOT {
            return self.slots.iter().flatten().any(|s| s.item_type == item_type);
        }

        self.slot(slot_index(slot))
            .is_some_and(|s| s.item_type == item_type)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_with(index: usize, item: &str) -> Inventory {
        let mut slots = vec![None; INVENTORY_SIZE];
        slots[index] = Some(ItemStack::new(item, 1, item));
        Inventory::from_slots(slots)
    }

    #[test]
    fn test_slot_table() {
        assert_eq!(slot_index("mainhand"), 36);
        assert_eq!(slot_index("offhand"), 45);
        assert_eq!(slot_index("helmet"), 5);
        assert_eq!(slot_index("chestplate"), 6);
        assert_eq!(slot_index("leggings"), 7);
        assert_eq!(slot_index("boots"), 8);
    }

    #[test]
    fn test_unknown_slot_falls_back_to_mainhand() {
        assert_eq!(slot_index("unknown_slot"), MAINHAND_SLOT);
        assert_eq!(slot_index(""), MAINHAND_SLOT);
    }

    #[test]
    fn test_has_item_offhand() {
        let inventory = inventory_with(OFFHAND_SLOT, "dragon_egg");
        assert!(inventory.has_item("dragon_egg", "offhand"));
        assert!(!inventory.has_item("dragon_egg", "mainhand"));
        assert!(!inventory.has_item("stone", "offhand"));
    }

    #[test]
    fn test_has_item_unknown_slot_reads_mainhand() {
        let inventory = inventory_with(MAINHAND_SLOT, "dragon_egg");
        assert!(inventory.has_item("dragon_egg", "unknown_slot"));

        let offhand_only = inventory_with(OFFHAND_SLOT, "dragon_egg");
        assert!(!offhand_only.has_item("dragon_egg", "unknown_slot"));
    }

    #[test]
    fn test_has_item_any() {
        let inventory = inventory_with(12, "dragon_egg");
        assert!(inventory.has_item("dragon_egg", ANY_SLOT));
        assert!(!inventory.has_item("elytra", ANY_SLOT));
    }

    #[test]
    fn test_items_in_slot_order() {
        let mut slots = vec![None; INVENTORY_SIZE];
        slots[40] = Some(ItemStack::new("stone", 64, "Stone"));
        slots[2] = Some(ItemStack::new("dirt", 3, "Dirt"));
        let items = Inventory::from_slots(slots).items();
        let names: Vec<_> = items.iter().map(|i| i.item_type.as_str()).collect();
        assert_eq!(names, ["dirt", "stone"]);
    }

    #[test]
    fn test_empty_inventory() {
        let inventory = Inventory::default();
        assert!(inventory.is_empty());
        assert!(!inventory.has_item("dragon_egg", "offhand"));
    }
}
