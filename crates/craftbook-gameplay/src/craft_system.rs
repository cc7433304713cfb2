//! Public crafting facade.
//!
//! [`CraftSystem`] bundles a catalog, its unlock tracker and the craft
//! executor behind the calls a crafting menu or gameplay script makes.
//! Listings are returned in catalog declaration order.

use craftbook_common::{CategoryId, RecipeId};

use crate::crafting::{CraftExecutor, RecipeView};
use crate::game_state::{EvalContext, GameState};
use crate::inventory::ItemBag;
use crate::recipes::{Catalog, Recipe};
use crate::unlocks::{SyncReport, SyncSettings, UnlockStore, UnlockTracker};

/// Which recipes a listing covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    /// Every category
    #[default]
    All,
    /// A single category
    Category(CategoryId),
}

/// Crafting entry point over one catalog and one unlock store.
#[derive(Debug)]
pub struct CraftSystem<'c, S: UnlockStore> {
    tracker: UnlockTracker<'c, S>,
}

impl<'c, S: UnlockStore> CraftSystem<'c, S> {
    /// Creates a crafting system over `catalog` and the host's unlock store.
    #[must_use]
    pub fn new(catalog: &'c Catalog, store: S) -> Self {
        Self {
            tracker: UnlockTracker::new(catalog, store),
        }
    }

    /// Replaces the synchronization settings.
    #[must_use]
    pub fn with_settings(self, settings: SyncSettings) -> Self {
        Self {
            tracker: self.tracker.with_settings(settings),
        }
    }

    /// The catalog.
    #[must_use]
    pub fn catalog(&self) -> &'c Catalog {
        self.tracker.catalog()
    }

    /// Releases the unlock store.
    pub fn into_store(self) -> S {
        self.tracker.into_store()
    }

    /// Reconciles the unlock store with the catalog.
    pub fn sync(&self, ctx: &EvalContext<'_>) -> Option<SyncReport> {
        self.tracker.sync(ctx)
    }

    /// Recipe definition for `id`.
    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&'c Recipe> {
        self.catalog().get(id)
    }

    /// Every recipe id, unlocked or not.
    #[must_use]
    pub fn all_recipe_ids(&self) -> Vec<&'c RecipeId> {
        self.catalog().ids().collect()
    }

    /// Whether `id` is unlocked.
    pub fn is_unlocked(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.tracker.is_unlocked(id, ctx)
    }

    /// Unlocked recipes.
    pub fn available_recipes(&self, ctx: &EvalContext<'_>) -> Vec<&'c RecipeId> {
        self.select(ctx, |_| true, true)
    }

    /// Locked recipes.
    pub fn locked_recipes(&self, ctx: &EvalContext<'_>) -> Vec<&'c RecipeId> {
        self.select(ctx, |_| true, false)
    }

    /// Unlocked recipes in `category`.
    pub fn recipes_by_category(&self, category: &str, ctx: &EvalContext<'_>) -> Vec<&'c RecipeId> {
        let category = CategoryId::new(category);
        self.select(ctx, |recipe| recipe.category == category, true)
    }

    /// Unlocked recipes matching `filter`.
    pub fn recipes_for(&self, filter: &CategoryFilter, ctx: &EvalContext<'_>) -> Vec<&'c RecipeId> {
        match filter {
            CategoryFilter::All => self.available_recipes(ctx),
            CategoryFilter::Category(category) => self.recipes_by_category(category.as_str(), ctx),
        }
    }

    /// Display name of a category.
    #[must_use]
    pub fn category_name(&self, category: &str) -> String {
        self.catalog().category_name(category)
    }

    /// How many times `id` can be crafted.
    pub fn max_craft(&self, id: &str, ctx: &EvalContext<'_>) -> u32 {
        self.executor().max_craft(id, ctx)
    }

    /// Whether `id` can be crafted `amount` times.
    pub fn can_craft(&self, id: &str, amount: u32, ctx: &EvalContext<'_>) -> bool {
        self.executor().can_craft(id, amount, ctx)
    }

    /// Crafts `id` `amount` times, all or nothing.
    pub fn craft(
        &self,
        id: &str,
        amount: u32,
        game: &dyn GameState,
        items: &mut dyn ItemBag,
    ) -> bool {
        self.executor().craft(id, amount, game, items)
    }

    /// Crafts `id` as many times as possible.
    pub fn craft_all(&self, id: &str, game: &dyn GameState, items: &mut dyn ItemBag) -> bool {
        self.executor().craft_all(id, game, items)
    }

    /// Unlocks `id`. Returns `false` for unknown recipes.
    pub fn unlock(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.tracker.unlock(id, ctx)
    }

    /// Locks `id`. Returns `false` for unknown recipes.
    pub fn lock(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.tracker.lock(id, ctx)
    }

    /// Display data for `id`.
    pub fn recipe_view(&self, id: &str, ctx: &EvalContext<'_>) -> Option<RecipeView> {
        self.executor().recipe_view(id, ctx)
    }

    fn executor(&self) -> CraftExecutor<'_, 'c, S> {
        CraftExecutor::new(&self.tracker)
    }

    fn select(
        &self,
        ctx: &EvalContext<'_>,
        keep: impl Fn(&Recipe) -> bool,
        unlocked: bool,
    ) -> Vec<&'c RecipeId> {
        self.tracker
            .unlock_states(ctx)
            .into_iter()
            .filter(|&(recipe, state)| state == unlocked && keep(recipe))
            .map(|(recipe, _)| &recipe.id)
            .collect()
    }
}
