//! Inventory system.
//!
//! [`ItemBag`] is the capability the crafting core needs from whatever holds
//! the player's items. [`Inventory`] is the in-memory implementation used by
//! tests and tools.

use craftbook_common::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read/write access to a container of items.
///
/// `remove_item` is only called after the caller has checked `quantity`, so
/// implementations may treat an oversized removal as a clamp to zero.
pub trait ItemBag {
    /// Returns how many of `item` are held.
    fn quantity(&self, item: &ItemId) -> u32;

    /// Adds `amount` of `item`.
    fn add_item(&mut self, item: &ItemId, amount: u32);

    /// Removes `amount` of `item`.
    fn remove_item(&mut self, item: &ItemId, amount: u32);
}

/// An inventory container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Items and their quantities
    items: HashMap<ItemId, u32>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct item types held.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the count of a specific item.
    #[must_use]
    pub fn count(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Adds items to the inventory.
    pub fn add(&mut self, item: impl Into<ItemId>, amount: u32) {
        if amount == 0 {
            return;
        }
        let entry = self.items.entry(item.into()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

impl ItemBag for Inventory {
    fn quantity(&self, item: &ItemId) -> u32 {
        self.count(item.as_str())
    }

    fn add_item(&mut self, item: &ItemId, amount: u32) {
        self.add(item.clone(), amount);
    }

    fn remove_item(&mut self, item: &ItemId, amount: u32) {
        let Some(held) = self.items.get_mut(item) else {
            return;
        };
        *held = held.saturating_sub(amount);
        if *held == 0 {
            self.items.remove(item);
        }
    }
}

impl<K: Into<ItemId>> FromIterator<(K, u32)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (K, u32)>>(iter: T) -> Self {
        let mut inventory = Self::new();
        for (item, amount) in iter {
            inventory.add(item, amount);
        }
        inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let mut inv = Inventory::new();
        inv.add("herb", 5);
        inv.add("herb", 2);
        assert_eq!(inv.count("herb"), 7);
        assert_eq!(inv.quantity(&ItemId::new("herb")), 7);
    }

    #[test]
    fn test_add_zero_creates_no_slot() {
        let mut inv = Inventory::new();
        inv.add("herb", 0);
        assert_eq!(inv.slot_count(), 0);
    }

    #[test]
    fn test_item_bag_remove_partial() {
        let mut inv: Inventory = [("herb", 5)].into_iter().collect();
        let herb = ItemId::new("herb");
        inv.remove_item(&herb, 2);
        assert_eq!(inv.quantity(&herb), 3);
        inv.remove_item(&herb, 3);
        assert_eq!(inv.quantity(&herb), 0);
        assert_eq!(inv.slot_count(), 0);
    }

    #[test]
    fn test_item_bag_remove_missing_item() {
        let mut inv: Inventory = [("herb", 1)].into_iter().collect();
        inv.remove_item(&ItemId::new("ore"), 4);
        assert_eq!(inv.slot_count(), 1);
        assert_eq!(inv.count("ore"), 0);
    }

    #[test]
    fn test_item_bag_remove_clamps() {
        let mut inv: Inventory = [("ore", 4)].into_iter().collect();
        let ore = ItemId::new("ore");
        inv.remove_item(&ore, 10);
        assert_eq!(inv.quantity(&ore), 0);
        assert_eq!(inv.slot_count(), 0);
    }
}
