//! # Craftbook Common
//!
//! Identifier types shared by every craftbook crate.
//!
//! Recipes, items and categories are named by content authors, so their ids
//! are normalized strings. Switches, variables and quests are numbered by the
//! host game and use integer ids.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_recipe_id_trims_whitespace() {
        assert_eq!(RecipeId::new("  potion "), RecipeId::new("potion"));
        assert_eq!(RecipeId::new("potion").as_str(), "potion");
    }

    #[test]
    fn test_string_ids_are_case_sensitive() {
        assert_ne!(ItemId::new("Herb"), ItemId::new("herb"));
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(RecipeId::new("potion"), true);
        assert_eq!(map.get("potion"), Some(&true));
    }

    #[test]
    fn test_display_matches_normalized_id() {
        let id = CategoryId::new(" misc");
        assert_eq!(id.to_string(), "misc");
    }

    #[test]
    fn test_string_id_serde_normalizes() {
        let id: RecipeId = serde_json::from_str("\" elixir \"").expect("valid json");
        assert_eq!(id.as_str(), "elixir");
        let json = serde_json::to_string(&id).expect("serializable");
        assert_eq!(json, "\"elixir\"");
    }

    #[test]
    fn test_integer_ids() {
        let switch = SwitchId::new(12);
        assert_eq!(switch.raw(), 12);
        assert_eq!(VariableId::new(4), VariableId::new(4));
        assert_eq!(QuestId::new(7).to_string(), "7");
    }
}
