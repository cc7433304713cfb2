//! Crafting system.
//!
//! Feasibility and the ingredient-for-result transaction. A craft is planned
//! in full against the current quantities before anything is removed, so a
//! failed craft leaves the item bag untouched.

use craftbook_common::{CategoryId, ItemId, RecipeId};
use serde::Serialize;
use tracing::{debug, trace};

use crate::game_state::{EvalContext, GameState};
use crate::inventory::ItemBag;
use crate::recipes::{Recipe, RecipeIngredient};
use crate::unlocks::{UnlockStore, UnlockTracker};

/// Whether `items` holds at least `quantity` of `item`. A zero quantity is
/// never satisfied.
pub fn has_item_quantity(items: &dyn ItemBag, item: &ItemId, quantity: u32) -> bool {
    quantity > 0 && items.quantity(item) >= quantity
}

/// How many times `recipe` could be crafted from `items`, ignoring unlocks.
///
/// Repeated ingredient entries count against the same held quantity. A
/// recipe without ingredients cannot be crafted.
pub fn craftable_amount(recipe: &Recipe, items: &dyn ItemBag) -> u32 {
    let Some(totals) = recipe.ingredient_totals() else {
        return 0;
    };
    totals
        .iter()
        .map(|ingredient| match ingredient.quantity {
            0 => 0,
            needed => items.quantity(&ingredient.item) / needed,
        })
        .min()
        .unwrap_or(0)
}

/// The full effect of one craft call, computed before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftPlan {
    /// Recipe being crafted
    pub recipe: RecipeId,
    /// Times the recipe is applied
    pub amount: u32,
    /// Total removal per item, merged across repeated ingredient entries
    pub consume: Vec<(ItemId, u32)>,
    /// Item produced
    pub result: ItemId,
    /// Total quantity produced
    pub produce: u32,
}

impl CraftPlan {
    /// Plans `amount` crafts of `recipe`. Returns `None` if any total overflows
    /// or is not held in full.
    pub fn build(recipe: &Recipe, amount: u32, items: &dyn ItemBag) -> Option<Self> {
        let totals = recipe.ingredient_totals()?;
        if amount == 0 || totals.is_empty() {
            return None;
        }

        let consume = totals
            .into_iter()
            .map(|ingredient| Some((ingredient.item, ingredient.quantity.checked_mul(amount)?)))
            .collect::<Option<Vec<_>>>()?;
        if !consume
            .iter()
            .all(|(item, total)| has_item_quantity(items, item, *total))
        {
            return None;
        }

        Some(Self {
            recipe: recipe.id.clone(),
            amount,
            consume,
            result: recipe.result.clone(),
            produce: recipe.result_quantity.checked_mul(amount)?,
        })
    }

    /// Applies the plan. Only call with the bag the plan was built against.
    pub fn commit(&self, items: &mut dyn ItemBag) {
        for (item, total) in &self.consume {
            items.remove_item(item, *total);
        }
        items.add_item(&self.result, self.produce);
    }
}

/// Display data for one recipe in a crafting menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeView {
    /// Recipe identifier
    pub id: RecipeId,
    /// Category identifier
    pub category: CategoryId,
    /// Category display name
    pub category_name: String,
    /// Item produced
    pub result: ItemId,
    /// Quantity produced per craft
    pub quantity: u32,
    /// Ingredients in declaration order
    pub ingredients: Vec<RecipeIngredient>,
    /// Whether the recipe is unlocked
    pub unlocked: bool,
    /// How many times it can be crafted right now
    pub max_craft: u32,
}

/// Runs crafts against a catalog and its unlock state.
pub struct CraftExecutor<'t, 'c, S: UnlockStore> {
    tracker: &'t UnlockTracker<'c, S>,
}

impl<'t, 'c, S: UnlockStore> CraftExecutor<'t, 'c, S> {
    /// Creates an executor reading unlocks from `tracker`.
    #[must_use]
    pub fn new(tracker: &'t UnlockTracker<'c, S>) -> Self {
        Self { tracker }
    }

    /// How many times `id` can be crafted. Zero when unknown, locked or
    /// without ingredients.
    pub fn max_craft(&self, id: &str, ctx: &EvalContext<'_>) -> u32 {
        let Some(recipe) = self.tracker.catalog().get(id) else {
            trace!("max_craft: unknown recipe `{id}`");
            return 0;
        };
        if !self.tracker.is_unlocked(id, ctx) {
            return 0;
        }
        craftable_amount(recipe, ctx.items)
    }

    /// Whether `id` can be crafted `amount` times.
    pub fn can_craft(&self, id: &str, amount: u32, ctx: &EvalContext<'_>) -> bool {
        self.max_craft(id, ctx) >= amount
    }

    /// Crafts `id` `amount` times.
    ///
    /// Either every ingredient is removed and the result added, or nothing
    /// changes. Returns whether the craft committed.
    pub fn craft(
        &self,
        id: &str,
        amount: u32,
        game: &dyn GameState,
        items: &mut dyn ItemBag,
    ) -> bool {
        if amount == 0 {
            trace!("Ignoring zero-amount craft of `{id}`");
            return false;
        }

        let plan = {
            let ctx = EvalContext::new(game, &*items);
            if !self.can_craft(id, amount, &ctx) {
                debug!("Cannot craft `{id}` x{amount}");
                return false;
            }
            let Some(recipe) = self.tracker.catalog().get(id) else {
                return false;
            };
            match CraftPlan::build(recipe, amount, ctx.items) {
                Some(plan) => plan,
                None => {
                    debug!("Cannot craft `{id}` x{amount}: requirements exceed held items");
                    return false;
                }
            }
        };

        plan.commit(items);
        debug!(
            "Crafted `{}` x{} -> {} {}",
            plan.recipe, plan.amount, plan.produce, plan.result
        );
        true
    }

    /// Crafts `id` as many times as currently possible.
    pub fn craft_all(&self, id: &str, game: &dyn GameState, items: &mut dyn ItemBag) -> bool {
        let amount = {
            let ctx = EvalContext::new(game, &*items);
            self.max_craft(id, &ctx)
        };
        if amount == 0 {
            return false;
        }
        self.craft(id, amount, game, items)
    }

    /// Display data for `id`, or `None` if unknown.
    pub fn recipe_view(&self, id: &str, ctx: &EvalContext<'_>) -> Option<RecipeView> {
        let catalog = self.tracker.catalog();
        let recipe = catalog.get(id)?;
        Some(RecipeView {
            id: recipe.id.clone(),
            category: recipe.category.clone(),
            category_name: catalog.category_name(recipe.category.as_str()),
            result: recipe.result.clone(),
            quantity: recipe.result_quantity,
            ingredients: recipe.ingredients.clone(),
            unlocked: self.tracker.is_unlocked(id, ctx),
            max_craft: self.max_craft(id, ctx),
        })
    }
}

impl<S: UnlockStore> std::fmt::Debug for CraftExecutor<'_, '_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraftExecutor")
            .field("tracker", self.tracker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::ConditionNode;
    use crate::game_state::GameFlags;
    use crate::inventory::Inventory;
    use crate::recipes::Catalog;
    use crate::unlocks::UnlockMap;
    use craftbook_common::SwitchId;
    use proptest::prelude::*;

    fn test_catalog() -> Catalog {
        Catalog::from_parts(
            Vec::new(),
            vec![
                Recipe::builder("plank", "wood", "plank")
                    .quantity(4)
                    .ingredient("log", 1)
                    .build(),
                Recipe::builder("mix", "misc", "mix")
                    .ingredient("a", 2)
                    .ingredient("b", 3)
                    .build(),
                Recipe::builder("lamp", "tools", "lamp")
                    .ingredient("oil", 1)
                    .unlock_condition(ConditionNode::switch(7))
                    .build(),
                Recipe::builder("wish", "misc", "wish").build(),
            ],
        )
        .expect("valid catalog")
    }

    #[test]
    fn test_max_craft_is_minimum_ratio() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let items: Inventory = [("a", 10), ("b", 6)].into_iter().collect();
        let ctx = EvalContext::new(&flags, &items);

        assert_eq!(executor.max_craft("mix", &ctx), 2);
        assert!(executor.can_craft("mix", 2, &ctx));
        assert!(!executor.can_craft("mix", 3, &ctx));
    }

    #[test]
    fn test_max_craft_zero_cases() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let items: Inventory = [("oil", 5), ("log", 1)].into_iter().collect();
        let ctx = EvalContext::new(&flags, &items);

        assert_eq!(executor.max_craft("unknown", &ctx), 0);
        assert_eq!(executor.max_craft("lamp", &ctx), 0); // locked
        assert_eq!(executor.max_craft("wish", &ctx), 0); // no ingredients
        assert_eq!(executor.max_craft("plank", &ctx), 1);
    }

    #[test]
    fn test_craft_success() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let mut items: Inventory = [("a", 10), ("b", 6)].into_iter().collect();

        assert!(executor.craft("mix", 2, &flags, &mut items));
        assert_eq!(items.count("a"), 6);
        assert_eq!(items.count("b"), 0);
        assert_eq!(items.count("mix"), 2);
    }

    #[test]
    fn test_craft_result_quantity_scales() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let mut items: Inventory = [("log", 3)].into_iter().collect();

        assert!(executor.craft("plank", 3, &flags, &mut items));
        assert_eq!(items.count("plank"), 12);
        assert_eq!(items.count("log"), 0);
    }

    #[test]
    fn test_craft_infeasible_changes_nothing() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let mut items: Inventory = [("a", 10), ("b", 6)].into_iter().collect();
        let before = items.clone();

        assert!(!executor.craft("mix", 3, &flags, &mut items));
        assert!(!executor.craft("mix", 0, &flags, &mut items));
        assert!(!executor.craft("nothing", 1, &flags, &mut items));
        assert_eq!(items, before);
    }

    #[test]
    fn test_craft_locked_recipe() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let mut flags = GameFlags::new();
        let mut items: Inventory = [("oil", 2)].into_iter().collect();

        assert!(!executor.craft("lamp", 1, &flags, &mut items));
        assert_eq!(items.count("oil"), 2);

        flags.set_switch(SwitchId::new(7), true);
        assert!(executor.craft("lamp", 1, &flags, &mut items));
        assert_eq!(items.count("lamp"), 1);
    }

    #[test]
    fn test_craft_all() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let mut items: Inventory = [("a", 7), ("b", 9)].into_iter().collect();

        assert!(executor.craft_all("mix", &flags, &mut items));
        assert_eq!(items.count("mix"), 3);
        assert_eq!(items.count("a"), 1);
        assert_eq!(items.count("b"), 0);

        assert!(!executor.craft_all("mix", &flags, &mut items));
        assert_eq!(items.count("mix"), 3);
    }

    #[test]
    fn test_plan_merges_repeated_ingredients() {
        let recipe = Recipe::builder("rope", "misc", "rope")
            .ingredient("fiber", 2)
            .ingredient("fiber", 2)
            .build();
        let items: Inventory = [("fiber", 9)].into_iter().collect();

        assert_eq!(craftable_amount(&recipe, &items), 2);
        let plan = CraftPlan::build(&recipe, 2, &items).expect("feasible");
        assert_eq!(plan.consume, vec![(ItemId::new("fiber"), 8)]);
        assert!(CraftPlan::build(&recipe, 3, &items).is_none());
    }

    #[test]
    fn test_repeated_ingredient_keys_craft_up_to_max() {
        let catalog = Catalog::from_json_str(
            r#"{ "data": { "rope": {
                "result": "rope", "category": "misc", "quantity": 1,
                "ingredients": { "fiber": 2, " fiber ": 2 }
            } } }"#,
        )
        .expect("valid catalog");
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let mut items: Inventory = [("fiber", 6)].into_iter().collect();

        let max = executor.max_craft("rope", &EvalContext::new(&flags, &items));
        assert_eq!(max, 1);
        assert!(executor.craft("rope", max, &flags, &mut items));
        assert_eq!(items.count("fiber"), 2);
        assert_eq!(items.count("rope"), 1);

        let mut items: Inventory = [("fiber", 13)].into_iter().collect();
        assert!(executor.craft_all("rope", &flags, &mut items));
        assert_eq!(items.count("rope"), 3);
        assert_eq!(items.count("fiber"), 1);
    }

    #[test]
    fn test_plan_overflow_is_infeasible() {
        let recipe = Recipe::builder("dust", "misc", "dust")
            .ingredient("sand", u32::MAX)
            .build();
        let items: Inventory = [("sand", u32::MAX)].into_iter().collect();

        assert!(CraftPlan::build(&recipe, 1, &items).is_some());
        assert!(CraftPlan::build(&recipe, 2, &items).is_none());
    }

    #[test]
    fn test_has_item_quantity() {
        let items: Inventory = [("gem", 2)].into_iter().collect();
        let gem = ItemId::new("gem");

        assert!(has_item_quantity(&items, &gem, 2));
        assert!(!has_item_quantity(&items, &gem, 3));
        assert!(!has_item_quantity(&items, &gem, 0));
    }

    #[test]
    fn test_recipe_view() {
        let catalog = test_catalog();
        let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
        let executor = CraftExecutor::new(&tracker);
        let flags = GameFlags::new();
        let items: Inventory = [("log", 2)].into_iter().collect();
        let ctx = EvalContext::new(&flags, &items);

        let view = executor.recipe_view("plank", &ctx).expect("known recipe");
        assert_eq!(view.category_name, "WOOD");
        assert_eq!(view.quantity, 4);
        assert!(view.unlocked);
        assert_eq!(view.max_craft, 2);
        assert!(executor.recipe_view("missing", &ctx).is_none());
    }

    proptest! {
        #[test]
        fn prop_craft_is_all_or_nothing(
            a_need in 1u32..5,
            b_need in 1u32..5,
            a_have in 0u32..30,
            b_have in 0u32..30,
            amount in 0u32..12,
        ) {
            let catalog = Catalog::from_parts(
                Vec::new(),
                vec![Recipe::builder("mix", "misc", "mix")
                    .quantity(2)
                    .ingredient("a", a_need)
                    .ingredient("b", b_need)
                    .build()],
            )
            .expect("valid catalog");
            let tracker = UnlockTracker::new(&catalog, UnlockMap::new());
            let executor = CraftExecutor::new(&tracker);
            let flags = GameFlags::new();
            let mut items: Inventory = [("a", a_have), ("b", b_have)].into_iter().collect();

            let max = executor.max_craft("mix", &EvalContext::new(&flags, &items));
            prop_assert_eq!(max, (a_have / a_need).min(b_have / b_need));

            let before = items.clone();
            let committed = executor.craft("mix", amount, &flags, &mut items);
            prop_assert_eq!(committed, amount > 0 && amount <= max);
            if committed {
                prop_assert_eq!(items.count("a"), a_have - a_need * amount);
                prop_assert_eq!(items.count("b"), b_have - b_need * amount);
                prop_assert_eq!(items.count("mix"), 2 * amount);
            } else {
                prop_assert_eq!(items, before);
            }
        }
    }
}
