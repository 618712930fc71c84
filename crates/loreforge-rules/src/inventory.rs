//! Inventory transfer and equip rules.
//!
//! The store executes transfers transactionally; the checks here decide
//! whether a transfer or equip is allowed at all. Two invariants matter:
//! an equipped stack never moves, and a character never has two equipped
//! entries in the same slot.

use loreforge_types::InventoryEntry;

use crate::error::RulesError;

/// Validate moving `quantity` units out of `entry`.
pub fn validate_transfer(entry: &InventoryEntry, quantity: i64) -> Result<(), RulesError> {
    if entry.equipped {
        return Err(RulesError::EquippedTransfer {
            item: entry.item_id.clone(),
        });
    }
    if quantity < 1 || entry.quantity < quantity {
        return Err(RulesError::InsufficientQuantity {
            item: entry.item_id.clone(),
            requested: quantity,
            available: entry.quantity,
        });
    }
    Ok(())
}

/// Validate equipping an entry into `slot`, given the character's other
/// inventory entries.
pub fn validate_equip(
    entry: &InventoryEntry,
    slot: &str,
    others: &[InventoryEntry],
) -> Result<(), RulesError> {
    if slot.trim().is_empty() {
        return Err(RulesError::SlotViolation {
            reason: String::from("an equipped item requires a named slot"),
        });
    }
    let occupied = others.iter().any(|other| {
        other.item_id != entry.item_id
            && other.equipped
            && other.slot.as_deref() == Some(slot)
    });
    if occupied {
        return Err(RulesError::SlotViolation {
            reason: format!("slot {slot:?} is already occupied"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use loreforge_types::{CharacterId, ItemId};

    use super::*;

    fn entry(item: &str, quantity: i64, equipped: bool, slot: Option<&str>) -> InventoryEntry {
        InventoryEntry {
            character_id: CharacterId::new("hero"),
            item_id: ItemId::new(item),
            quantity,
            equipped,
            slot: slot.map(str::to_owned),
        }
    }

    #[test]
    fn equipped_stacks_cannot_move() {
        let sword = entry("sword", 1, true, Some("main_hand"));
        assert!(matches!(
            validate_transfer(&sword, 1),
            Err(RulesError::EquippedTransfer { .. })
        ));
    }

    #[test]
    fn transfer_requires_enough_quantity() {
        let arrows = entry("arrow", 5, false, None);
        assert!(validate_transfer(&arrows, 5).is_ok());
        assert!(matches!(
            validate_transfer(&arrows, 6),
            Err(RulesError::InsufficientQuantity {
                requested: 6,
                available: 5,
                ..
            })
        ));
        assert!(validate_transfer(&arrows, 0).is_err());
    }

    #[test]
    fn equip_requires_a_slot_and_a_free_slot() {
        let shield = entry("shield", 1, false, None);
        assert!(matches!(
            validate_equip(&shield, "  ", &[]),
            Err(RulesError::SlotViolation { .. })
        ));

        let sword = entry("sword", 1, true, Some("main_hand"));
        assert!(matches!(
            validate_equip(&shield, "main_hand", core::slice::from_ref(&sword)),
            Err(RulesError::SlotViolation { .. })
        ));
        assert!(validate_equip(&shield, "off_hand", core::slice::from_ref(&sword)).is_ok());
    }
}
