//! Read-only game state consulted by unlock conditions.
//!
//! The host game owns switches, variables and quest progress. The crafting
//! core only reads them through [`GameState`], bundled with the inventory view
//! in an [`EvalContext`].

use craftbook_common::{QuestId, SwitchId, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::inventory::ItemBag;

/// View of the host's switches, variables and quest log.
pub trait GameState {
    /// Value of a boolean switch. Unset switches are `false`.
    fn switch(&self, id: SwitchId) -> bool;

    /// Value of an integer variable. Unset variables are `0`.
    fn variable(&self, id: VariableId) -> i64;

    /// Whether the quest has been completed.
    fn quest_finished(&self, id: QuestId) -> bool;
}

/// In-memory game state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameFlags {
    /// Switch values
    pub switches: HashMap<SwitchId, bool>,
    /// Variable values
    pub variables: HashMap<VariableId, i64>,
    /// Completed quests
    pub finished_quests: HashSet<QuestId>,
}

impl GameFlags {
    /// Creates empty game state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a switch.
    pub fn set_switch(&mut self, id: SwitchId, value: bool) {
        self.switches.insert(id, value);
    }

    /// Sets a variable.
    pub fn set_variable(&mut self, id: VariableId, value: i64) {
        self.variables.insert(id, value);
    }

    /// Marks a quest as completed.
    pub fn finish_quest(&mut self, id: QuestId) {
        self.finished_quests.insert(id);
    }
}

impl GameState for GameFlags {
    fn switch(&self, id: SwitchId) -> bool {
        self.switches.get(&id).copied().unwrap_or(false)
    }

    fn variable(&self, id: VariableId) -> i64 {
        self.variables.get(&id).copied().unwrap_or(0)
    }

    fn quest_finished(&self, id: QuestId) -> bool {
        self.finished_quests.contains(&id)
    }
}

/// Everything a condition may read besides the unlock store.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Switches, variables and quests
    pub game: &'a dyn GameState,
    /// Item quantities
    pub items: &'a dyn ItemBag,
}

impl<'a> EvalContext<'a> {
    /// Bundles a game state and an item view.
    #[must_use]
    pub fn new(game: &'a dyn GameState, items: &'a dyn ItemBag) -> Self {
        Self { game, items }
    }
}

impl std::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_values_default() {
        let flags = GameFlags::new();
        assert!(!flags.switch(SwitchId::new(1)));
        assert_eq!(flags.variable(VariableId::new(1)), 0);
        assert!(!flags.quest_finished(QuestId::new(1)));
    }

    #[test]
    fn test_set_values() {
        let mut flags = GameFlags::new();
        flags.set_switch(SwitchId::new(3), true);
        flags.set_variable(VariableId::new(4), -2);
        flags.finish_quest(QuestId::new(9));

        assert!(flags.switch(SwitchId::new(3)));
        assert_eq!(flags.variable(VariableId::new(4)), -2);
        assert!(flags.quest_finished(QuestId::new(9)));
    }

    #[test]
    fn test_flags_deserialize_partial() {
        let flags: GameFlags =
            serde_json::from_str(r#"{ "variables": { "4": 5 } }"#).expect("valid json");
        assert_eq!(flags.variable(VariableId::new(4)), 5);
        assert!(flags.switches.is_empty());
    }
}
