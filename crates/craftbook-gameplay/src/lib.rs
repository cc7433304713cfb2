//! # Craftbook Gameplay
//!
//! Recipe crafting for Craftbook.
//!
//! This crate provides:
//! - Recipe catalog loading with normalized unlock conditions
//! - Unlock condition evaluation (switches, variables, quests, items, recipes)
//! - Unlock-state synchronization against the host's save data
//! - Atomic craft execution against an item bag
//! - The [`CraftSystem`] facade used by menus and scripts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod conditions;
pub mod craft_system;
pub mod crafting;
pub mod game_state;
pub mod inventory;
pub mod recipes;
pub mod unlocks;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::conditions::*;
    pub use crate::craft_system::*;
    pub use crate::crafting::*;
    pub use crate::game_state::*;
    pub use crate::inventory::*;
    pub use crate::recipes::*;
    pub use crate::unlocks::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use craftbook_common::{QuestId, RecipeId};

    #[test]
    fn test_catalog_reload_keeps_save_data() {
        let v1 = Catalog::from_json_str(
            r#"{"categories": [], "data": {
                "torch": {"result": "torch", "quantity": 2, "category": "light",
                          "ingredients": {"stick": 1},
                          "unlock_condition": {"type": "quest", "id": 3}},
                "old_lamp": {"result": "lamp", "quantity": 1, "category": "light",
                             "ingredients": {"oil": 1}}
            }}"#,
        )
        .expect("v1 loads");
        let v2 = Catalog::from_json_str(
            r#"{"categories": [], "data": {
                "torch": {"result": "torch", "quantity": 2, "category": "light",
                          "ingredients": {"stick": 1},
                          "unlock_condition": {"type": "quest", "id": 3}},
                "lantern": {"result": "lantern", "quantity": 1, "category": "light",
                            "ingredients": {"oil": 2},
                            "unlock_condition": {"type": "recipe", "key": "torch"}}
            }}"#,
        )
        .expect("v2 loads");

        let mut flags = GameFlags::new();
        flags.finish_quest(QuestId::new(3));
        let mut items: Inventory = [("stick", 1), ("oil", 2)].into_iter().collect();

        let mut save: Option<UnlockMap> = None;
        {
            let system = CraftSystem::new(&v1, ensure_unlock_map(&mut save));
            assert!(system.craft("torch", 1, &flags, &mut items));
        }

        let system = CraftSystem::new(&v2, ensure_unlock_map(&mut save));
        assert!(system.craft("lantern", 1, &flags, &mut items));
        drop(system);

        let save = save.expect("created on first use");
        let mut keys: Vec<&RecipeId> = save.keys().collect();
        keys.sort();
        assert_eq!(keys, [&RecipeId::new("lantern"), &RecipeId::new("torch")]);
        assert_eq!(items.count("torch"), 2);
        assert_eq!(items.count("lantern"), 1);
    }
}
