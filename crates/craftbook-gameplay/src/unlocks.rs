//! Unlock-state synchronization.
//!
//! The unlock store maps every recipe id to a boolean and lives in the host's
//! save data. For manual recipes the stored value is authoritative; for every
//! other recipe it caches the last evaluation of the recipe's condition.
//!
//! [`UnlockTracker`] keeps the store consistent with a catalog:
//! 1. prune entries whose recipe disappeared, locking anything that
//!    referenced them (transitively)
//! 2. seed entries for new recipes
//! 3. re-evaluate derived recipes until a sweep changes nothing
//!
//! Every store access made through the tracker synchronizes first. An access
//! made while synchronized work is already on the stack does not synchronize
//! again, so condition evaluation can read the store without recursing.
//!
//! Within one top-level call, the result of each recipe outside a reference
//! cycle is memoized. Such a result only depends on the store's key set, the
//! manual entries and the game context, none of which change mid-call except
//! through an explicit unlock or lock, which clears the memo.

use ahash::{AHashMap, AHashSet};
use craftbook_common::RecipeId;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace, warn};

use crate::conditions::{ConditionEvaluator, ConditionNode, RecipeStatus, ResolvePath};
use crate::game_state::EvalContext;
use crate::recipes::{Catalog, Recipe};

// ============================================================================
// Store
// ============================================================================

/// Persisted recipe unlock states, owned by the host.
pub trait UnlockStore {
    /// Stored value for `id`.
    fn get(&self, id: &str) -> Option<bool>;

    /// Stores a value for `id`.
    fn set(&mut self, id: RecipeId, unlocked: bool);

    /// Whether `id` has an entry.
    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Deletes the entry for `id`, returning its value.
    fn remove(&mut self, id: &str) -> Option<bool>;

    /// All ids with an entry.
    fn keys(&self) -> Vec<RecipeId>;
}

/// The default store: a plain map, serializable inside save data.
pub type UnlockMap = HashMap<RecipeId, bool>;

impl UnlockStore for UnlockMap {
    fn get(&self, id: &str) -> Option<bool> {
        HashMap::get(self, id).copied()
    }

    fn set(&mut self, id: RecipeId, unlocked: bool) {
        self.insert(id, unlocked);
    }

    fn contains(&self, id: &str) -> bool {
        self.contains_key(id)
    }

    fn remove(&mut self, id: &str) -> Option<bool> {
        HashMap::remove(self, id)
    }

    fn keys(&self) -> Vec<RecipeId> {
        HashMap::keys(self).cloned().collect()
    }
}

impl<S: UnlockStore + ?Sized> UnlockStore for &mut S {
    fn get(&self, id: &str) -> Option<bool> {
        (**self).get(id)
    }

    fn set(&mut self, id: RecipeId, unlocked: bool) {
        (**self).set(id, unlocked);
    }

    fn contains(&self, id: &str) -> bool {
        (**self).contains(id)
    }

    fn remove(&mut self, id: &str) -> Option<bool> {
        (**self).remove(id)
    }

    fn keys(&self) -> Vec<RecipeId> {
        (**self).keys()
    }
}

/// Returns the unlock map in `slot`, creating an empty one on first use.
pub fn ensure_unlock_map(slot: &mut Option<UnlockMap>) -> &mut UnlockMap {
    slot.get_or_insert_with(UnlockMap::new)
}

// ============================================================================
// Tracker
// ============================================================================

/// Synchronization tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSettings {
    /// Maximum refresh sweeps per synchronization. `None` uses the catalog
    /// size plus one confirming sweep.
    pub max_sweeps: Option<usize>,
}

/// What one synchronization did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries removed because their recipe left the catalog
    pub pruned: usize,
    /// Dependent entries forced to locked by those removals
    pub invalidated: usize,
    /// Entries created for recipes new to the store
    pub seeded: usize,
    /// Derived entries whose value changed during refresh
    pub updated: usize,
    /// Refresh sweeps performed
    pub sweeps: usize,
    /// Whether the final sweep changed nothing
    pub converged: bool,
}

/// Resets the reentrancy flag when synchronized work leaves the stack.
struct BusyGuard<'g>(&'g Cell<bool>);

impl<'g> BusyGuard<'g> {
    fn enter(flag: &'g Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Disables the memo while a nested call runs under a foreign context.
struct MemoPause<'g> {
    flag: &'g Cell<bool>,
    previous: bool,
}

impl<'g> MemoPause<'g> {
    fn enter(flag: &'g Cell<bool>) -> Self {
        Self {
            flag,
            previous: flag.replace(false),
        }
    }
}

impl Drop for MemoPause<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Keeps an unlock store consistent with a catalog.
pub struct UnlockTracker<'a, S: UnlockStore> {
    catalog: &'a Catalog,
    store: RefCell<S>,
    settings: SyncSettings,
    busy: Cell<bool>,
    reported_cycles: RefCell<AHashSet<RecipeId>>,
    cyclic: AHashSet<RecipeId>,
    memo: RefCell<AHashMap<RecipeId, bool>>,
    memo_enabled: Cell<bool>,
}

impl<'a, S: UnlockStore> UnlockTracker<'a, S> {
    /// Creates a tracker over `store`. Nothing is synchronized until first use.
    #[must_use]
    pub fn new(catalog: &'a Catalog, store: S) -> Self {
        Self {
            catalog,
            store: RefCell::new(store),
            settings: SyncSettings::default(),
            busy: Cell::new(false),
            reported_cycles: RefCell::new(AHashSet::new()),
            cyclic: catalog.dependency_cycles().into_iter().cloned().collect(),
            memo: RefCell::new(AHashMap::new()),
            memo_enabled: Cell::new(true),
        }
    }

    /// Replaces the synchronization settings.
    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The catalog this tracker synchronizes against.
    #[must_use]
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Releases the store.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    /// Whether synchronized work is currently on the stack.
    #[must_use]
    pub fn is_synchronizing(&self) -> bool {
        self.busy.get()
    }

    /// Reconciles the store with the catalog and refreshes derived entries.
    ///
    /// Returns `None` without doing anything when called from inside
    /// synchronized work.
    pub fn sync(&self, ctx: &EvalContext<'_>) -> Option<SyncReport> {
        let Some(_guard) = BusyGuard::enter(&self.busy) else {
            trace!("Nested unlock sync dropped");
            return None;
        };
        self.memo.borrow_mut().clear();
        Some(self.run_sync(ctx))
    }

    /// Whether `id` is unlocked. Unknown recipes are locked.
    pub fn is_unlocked(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.synchronized(ctx, || {
            self.catalog
                .get(id)
                .is_some_and(|recipe| self.resolve_root(&recipe.id, ctx))
        })
    }

    /// Every recipe with its unlock state, in declaration order.
    pub fn unlock_states(&self, ctx: &EvalContext<'_>) -> Vec<(&'a Recipe, bool)> {
        self.synchronized(ctx, || {
            self.catalog
                .recipes()
                .map(|recipe| (recipe, self.resolve_root(&recipe.id, ctx)))
                .collect()
        })
    }

    /// Evaluates an arbitrary condition against the synchronized store.
    pub fn evaluate(&self, condition: &ConditionNode, ctx: &EvalContext<'_>) -> bool {
        self.synchronized(ctx, || {
            let mut path = ResolvePath::new();
            let met = ConditionEvaluator::new(self, *ctx).evaluate(condition, &mut path);
            self.report_cycles(&path);
            met
        })
    }

    /// Stored value for `id` after synchronizing.
    pub fn stored_state(&self, id: &str, ctx: &EvalContext<'_>) -> Option<bool> {
        self.synchronized(ctx, || self.store.borrow().get(id))
    }

    /// Sets a recipe unlocked and propagates to dependents.
    ///
    /// Returns `false` (and changes nothing) for recipes not in the catalog.
    pub fn unlock(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.set_state(id, true, ctx)
    }

    /// Sets a recipe locked and propagates to dependents.
    ///
    /// Returns `false` (and changes nothing) for recipes not in the catalog.
    pub fn lock(&self, id: &str, ctx: &EvalContext<'_>) -> bool {
        self.set_state(id, false, ctx)
    }

    fn set_state(&self, id: &str, unlocked: bool, ctx: &EvalContext<'_>) -> bool {
        self.synchronized(ctx, || {
            let Some(recipe) = self.catalog.get(id) else {
                trace!("Ignoring unlock change for unknown recipe `{id}`");
                return false;
            };
            if !recipe.is_manual() {
                debug!("Recipe `{id}` is derived; explicit state is overwritten by refresh");
            }
            self.store.borrow_mut().set(recipe.id.clone(), unlocked);
            self.memo.borrow_mut().clear();
            let mut report = SyncReport::default();
            self.refresh(ctx, &mut report);
            true
        })
    }

    /// Runs `body` after synchronizing, unless already inside synchronized work.
    fn synchronized<R>(&self, ctx: &EvalContext<'_>, body: impl FnOnce() -> R) -> R {
        let Some(_guard) = BusyGuard::enter(&self.busy) else {
            let _pause = MemoPause::enter(&self.memo_enabled);
            return body();
        };
        self.memo.borrow_mut().clear();
        self.run_sync(ctx);
        body()
    }

    fn run_sync(&self, ctx: &EvalContext<'_>) -> SyncReport {
        let mut report = SyncReport::default();

        let stale: Vec<RecipeId> = self
            .store
            .borrow()
            .keys()
            .into_iter()
            .filter(|id| !self.catalog.contains(id.as_str()))
            .collect();
        for id in stale {
            self.store.borrow_mut().remove(id.as_str());
            debug!("Pruned unlock state for removed recipe `{id}`");
            report.pruned += 1;
            report.invalidated += self.invalidate_dependents(&id);
        }

        for recipe in self.catalog.recipes() {
            let mut store = self.store.borrow_mut();
            if !store.contains(recipe.id.as_str()) {
                store.set(recipe.id.clone(), recipe.seed_value());
                report.seeded += 1;
            }
        }
        if report.seeded > 0 {
            debug!("Seeded unlock state for {} recipes", report.seeded);
        }

        self.refresh(ctx, &mut report);
        report
    }

    /// Forces every derived recipe that references `removed`, directly or
    /// through another forced recipe, to locked. Returns how many were forced.
    fn invalidate_dependents(&self, removed: &RecipeId) -> usize {
        let mut forced: AHashSet<RecipeId> = AHashSet::new();
        let mut queue = VecDeque::from([removed.clone()]);

        while let Some(gone) = queue.pop_front() {
            for recipe in self.catalog.recipes() {
                if recipe.is_manual() || forced.contains(&recipe.id) {
                    continue;
                }
                let references = recipe
                    .unlock_condition
                    .as_ref()
                    .is_some_and(|condition| condition.references(gone.as_str()));
                if !references {
                    continue;
                }
                let mut store = self.store.borrow_mut();
                if !store.contains(recipe.id.as_str()) {
                    continue;
                }
                store.set(recipe.id.clone(), false);
                forced.insert(recipe.id.clone());
                queue.push_back(recipe.id.clone());
            }
        }

        if !forced.is_empty() {
            warn!(
                "Removal of recipe `{removed}` locked {} dependent recipes",
                forced.len()
            );
        }
        forced.len()
    }

    /// Re-evaluates derived recipes until a sweep changes nothing or the
    /// sweep limit is reached.
    fn refresh(&self, ctx: &EvalContext<'_>, report: &mut SyncReport) {
        let limit = self
            .settings
            .max_sweeps
            .unwrap_or(self.catalog.len() + 1)
            .max(1);

        report.converged = false;
        for sweep in 1..=limit {
            report.sweeps = sweep;
            let mut dirty = false;

            for recipe in self.catalog.recipes().filter(|r| !r.is_manual()) {
                let unlocked = self.resolve_root(&recipe.id, ctx);

                let mut store = self.store.borrow_mut();
                if store.get(recipe.id.as_str()) != Some(unlocked) {
                    store.set(recipe.id.clone(), unlocked);
                    report.updated += 1;
                    dirty = true;
                }
            }

            if !dirty {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            warn!(
                "Unlock refresh did not settle within {limit} sweeps; keeping last computed state"
            );
        }
    }

    fn resolve_root(&self, id: &RecipeId, ctx: &EvalContext<'_>) -> bool {
        let mut path = ResolvePath::new();
        let unlocked = self.resolve_on_path(id, ctx, &mut path);
        self.report_cycles(&path);
        unlocked
    }

    fn resolve_on_path(&self, id: &RecipeId, ctx: &EvalContext<'_>, path: &mut ResolvePath) -> bool {
        let Some(recipe) = self.catalog.get(id.as_str()) else {
            return false;
        };
        let Some(condition) = &recipe.unlock_condition else {
            return true;
        };
        if condition.is_manual() {
            return self.stored(id, ctx) == Some(true);
        }

        // Outside a cycle the result cannot depend on which recipes are above it on the path.
        let memoize = self.memo_enabled.get() && !self.cyclic.contains(&recipe.id);
        if memoize {
            let cached = self.memo.borrow().get(&recipe.id).copied();
            if let Some(unlocked) = cached {
                return unlocked;
            }
        }

        path.push(id);
        let unlocked = ConditionEvaluator::new(self, *ctx).evaluate(condition, path);
        path.pop();

        if memoize {
            self.memo.borrow_mut().insert(recipe.id.clone(), unlocked);
        }
        unlocked
    }

    fn report_cycles(&self, path: &ResolvePath) {
        for id in path.cycle_hits() {
            if self.reported_cycles.borrow_mut().insert(id.clone()) {
                warn!("Recipe `{id}` depends on itself through recipe references; treating it as locked");
            }
        }
    }
}

impl<S: UnlockStore> RecipeStatus for UnlockTracker<'_, S> {
    fn is_tracked(&self, id: &RecipeId, ctx: &EvalContext<'_>) -> bool {
        self.synchronized(ctx, || self.store.borrow().contains(id.as_str()))
    }

    fn stored(&self, id: &RecipeId, ctx: &EvalContext<'_>) -> Option<bool> {
        self.synchronized(ctx, || self.store.borrow().get(id.as_str()))
    }

    fn is_manual(&self, id: &RecipeId) -> bool {
        self.catalog.get(id.as_str()).is_some_and(Recipe::is_manual)
    }

    fn resolve(&self, id: &RecipeId, ctx: &EvalContext<'_>, path: &mut ResolvePath) -> bool {
        self.resolve_on_path(id, ctx, path)
    }
}

impl<S: UnlockStore> std::fmt::Debug for UnlockTracker<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockTracker")
            .field("recipes", &self.catalog.len())
            .field("settings", &self.settings)
            .field("busy", &self.busy.get())
            .finish_non_exhaustive()
    }
}
