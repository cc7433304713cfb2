//! Recipe catalog.
//!
//! This module provides:
//! - Recipe and category definitions
//! - Catalog loading from JSON or RON content, with unlock conditions normalized
//! - Lookup by id and category, in declaration order
//! - Authoring diagnostics (dangling references, dependency cycles)
//!
//! A catalog is immutable once loaded. A content update is a new catalog.

use ahash::{AHashMap, AHashSet};
use craftbook_common::{CategoryId, ItemId, RecipeId};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::conditions::{self, ConditionNode};

/// Errors raised while loading a catalog. Any error aborts the whole load.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A recipe lacks a required field.
    #[error("recipe `{recipe}` is missing required field `{field}`")]
    MissingField {
        /// Recipe being loaded
        recipe: RecipeId,
        /// Missing field
        field: &'static str,
    },

    /// A condition leaf lacks the field its kind requires.
    #[error("recipe `{recipe}`: `{kind}` condition is missing required field `{field}`")]
    MissingConditionField {
        /// Recipe being loaded
        recipe: RecipeId,
        /// Declared leaf kind
        kind: String,
        /// Missing field
        field: &'static str,
    },

    /// A field is present but unusable.
    #[error("recipe `{recipe}`: invalid `{field}`: {reason}")]
    InvalidField {
        /// Recipe being loaded
        recipe: RecipeId,
        /// Offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// Two recipes share an id.
    #[error("duplicate recipe id `{0}`")]
    DuplicateRecipe(RecipeId),

    /// The document does not have the catalog shape.
    #[error("invalid catalog document: {0}")]
    InvalidDocument(String),

    /// JSON syntax error.
    #[error("failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// RON syntax error.
    #[error("failed to parse catalog RON: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The catalog file could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// Definitions
// ============================================================================

/// A recipe category, listed in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Category identifier
    pub id: CategoryId,
    /// Display text reference, resolved by the host's localization
    pub display_text_ref: Option<String>,
}

impl Category {
    /// Creates a category.
    #[must_use]
    pub fn new(id: impl Into<CategoryId>, display_text_ref: Option<String>) -> Self {
        Self {
            id: id.into(),
            display_text_ref,
        }
    }
}

/// An ingredient requirement for a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeIngredient {
    /// Item consumed
    pub item: ItemId,
    /// Quantity consumed per craft
    pub quantity: u32,
}

impl RecipeIngredient {
    /// Create a new ingredient requirement.
    #[must_use]
    pub fn new(item: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// A crafting recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Recipe identifier
    pub id: RecipeId,
    /// Category for listing
    pub category: CategoryId,
    /// Item produced
    pub result: ItemId,
    /// Quantity produced per craft
    pub result_quantity: u32,
    /// Ingredients in declaration order
    pub ingredients: Vec<RecipeIngredient>,
    /// Unlock condition; `None` means always unlocked
    pub unlock_condition: Option<ConditionNode>,
}

impl Recipe {
    /// Creates a new recipe builder producing one `result` per craft.
    #[must_use]
    pub fn builder(
        id: impl Into<RecipeId>,
        category: impl Into<CategoryId>,
        result: impl Into<ItemId>,
    ) -> RecipeBuilder {
        RecipeBuilder {
            recipe: Recipe {
                id: id.into(),
                category: category.into(),
                result: result.into(),
                result_quantity: 1,
                ingredients: Vec::new(),
                unlock_condition: None,
            },
        }
    }

    /// Whether the recipe's unlock state is set explicitly rather than derived.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.unlock_condition
            .as_ref()
            .is_some_and(ConditionNode::is_manual)
    }

    /// Store value a recipe starts with the first time it is tracked.
    #[must_use]
    pub fn seed_value(&self) -> bool {
        self.unlock_condition
            .as_ref()
            .and_then(ConditionNode::manual_default)
            .unwrap_or(false)
    }

    /// Ingredients with repeated items merged into one entry, in first-seen
    /// order. Returns `None` if a merged quantity overflows.
    #[must_use]
    pub fn ingredient_totals(&self) -> Option<Vec<RecipeIngredient>> {
        let mut totals: Vec<RecipeIngredient> = Vec::with_capacity(self.ingredients.len());
        for ingredient in &self.ingredients {
            match totals.iter_mut().find(|total| total.item == ingredient.item) {
                Some(total) => total.quantity = total.quantity.checked_add(ingredient.quantity)?,
                None => totals.push(ingredient.clone()),
            }
        }
        Some(totals)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.result_quantity == 0 {
            return Err(ConfigError::InvalidField {
                recipe: self.id.clone(),
                field: "quantity".into(),
                reason: "must be greater than zero".into(),
            });
        }
        for ingredient in &self.ingredients {
            if ingredient.quantity == 0 {
                return Err(ConfigError::InvalidField {
                    recipe: self.id.clone(),
                    field: format!("ingredients.{}", ingredient.item),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for creating recipes in code.
#[derive(Debug)]
pub struct RecipeBuilder {
    recipe: Recipe,
}

impl RecipeBuilder {
    /// Sets the quantity produced per craft.
    #[must_use]
    pub fn quantity(mut self, quantity: u32) -> Self {
        self.recipe.result_quantity = quantity;
        self
    }

    /// Adds an ingredient requirement.
    #[must_use]
    pub fn ingredient(mut self, item: impl Into<ItemId>, quantity: u32) -> Self {
        self.recipe
            .ingredients
            .push(RecipeIngredient::new(item, quantity));
        self
    }

    /// Sets the unlock condition.
    #[must_use]
    pub fn unlock_condition(mut self, condition: ConditionNode) -> Self {
        self.recipe.unlock_condition = Some(condition);
        self
    }

    /// Builds the recipe. Quantities are validated when it joins a catalog.
    #[must_use]
    pub fn build(self) -> Recipe {
        self.recipe
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The normalized recipe and category definitions of one content version.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<Category>,
    recipes: Vec<Recipe>,
    index: AHashMap<RecipeId, usize>,
}

impl Catalog {
    /// Builds a catalog from already-normalized definitions.
    ///
    /// Ingredient entries naming the same item are merged into one.
    pub fn from_parts(categories: Vec<Category>, mut recipes: Vec<Recipe>) -> ConfigResult<Self> {
        let mut index = AHashMap::with_capacity(recipes.len());
        for (position, recipe) in recipes.iter_mut().enumerate() {
            recipe.validate()?;
            let merged = recipe
                .ingredient_totals()
                .ok_or_else(|| ConfigError::InvalidField {
                    recipe: recipe.id.clone(),
                    field: "ingredients".into(),
                    reason: "merged quantity overflows".into(),
                })?;
            recipe.ingredients = merged;
            if index.insert(recipe.id.clone(), position).is_some() {
                return Err(ConfigError::DuplicateRecipe(recipe.id.clone()));
            }
        }
        Ok(Self {
            categories,
            recipes,
            index,
        })
    }

    /// Loads a catalog from a raw content document.
    ///
    /// The document holds `categories` (a list) and `data` (a map from recipe
    /// id to recipe; `recipes` is accepted as well).
    pub fn load(raw: &Value) -> ConfigResult<Self> {
        let root = raw.as_object().ok_or_else(|| {
            ConfigError::InvalidDocument("expected an object at the top level".into())
        })?;

        let categories = match field(root, "categories") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .enumerate()
                .map(|(position, entry)| parse_category(position, entry))
                .collect::<ConfigResult<_>>()?,
            Some(_) => {
                return Err(ConfigError::InvalidDocument(
                    "`categories` must be a list".into(),
                ))
            },
        };

        let recipes = match field(root, "data").or_else(|| field(root, "recipes")) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, entry)| parse_recipe(key, entry))
                .collect::<ConfigResult<_>>()?,
            Some(_) => {
                return Err(ConfigError::InvalidDocument(
                    "`data` must map recipe ids to recipes".into(),
                ))
            },
        };

        let catalog = Self::from_parts(categories, recipes)?;
        info!(
            "Loaded recipe catalog: {} recipes in {} categories",
            catalog.len(),
            catalog.categories.len()
        );
        Ok(catalog)
    }

    /// Loads a catalog from JSON text.
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let raw: Value = serde_json::from_str(content)?;
        Self::load(&raw)
    }

    /// Loads a catalog from RON text written with map syntax.
    pub fn from_ron_str(content: &str) -> ConfigResult<Self> {
        let raw: Value = ron::from_str(content)?;
        Self::load(&raw)
    }

    /// Gets a recipe by id. Surrounding whitespace is ignored.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.index.get(id.trim()).map(|&position| &self.recipes[position])
    }

    /// Whether the catalog defines `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id.trim())
    }

    /// Recipe ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &RecipeId> + '_ {
        self.recipes.iter().map(|recipe| &recipe.id)
    }

    /// Recipes in declaration order.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> + '_ {
        self.recipes.iter()
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Whether the catalog has no recipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Categories in catalog order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Gets a category by id.
    #[must_use]
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id.as_str() == id.trim())
    }

    /// Display reference for a category, or its id uppercased when the
    /// category is not declared.
    #[must_use]
    pub fn category_name(&self, id: &str) -> String {
        self.category(id)
            .and_then(|c| c.display_text_ref.clone())
            .unwrap_or_else(|| id.trim().to_uppercase())
    }

    /// Recipes whose condition references `id` directly or through operators.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<&RecipeId> {
        self.recipes
            .iter()
            .filter(|r| r.unlock_condition.as_ref().is_some_and(|c| c.references(id)))
            .map(|r| &r.id)
            .collect()
    }

    /// `(recipe, target)` pairs where a recipe reference names an unknown recipe.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<(&RecipeId, &RecipeId)> {
        let mut dangling = Vec::new();
        for recipe in &self.recipes {
            let Some(condition) = &recipe.unlock_condition else {
                continue;
            };
            for target in condition.recipe_refs() {
                if !self.contains(target.as_str()) {
                    dangling.push((&recipe.id, target));
                }
            }
        }
        dangling
    }

    /// Recipes that can reach themselves through recipe references.
    #[must_use]
    pub fn dependency_cycles(&self) -> Vec<&RecipeId> {
        self.recipes
            .iter()
            .filter(|recipe| self.reaches(&recipe.id, &recipe.id))
            .map(|recipe| &recipe.id)
            .collect()
    }

    /// Whether `target` is reachable from `start` along at least one edge.
    fn reaches(&self, start: &RecipeId, target: &RecipeId) -> bool {
        let mut visited: AHashSet<&RecipeId> = AHashSet::new();
        let mut stack = self.direct_refs(start);
        while let Some(next) = stack.pop() {
            if next == target {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.direct_refs(next));
            }
        }
        false
    }

    fn direct_refs(&self, id: &RecipeId) -> Vec<&RecipeId> {
        self.get(id.as_str())
            .and_then(|r| r.unlock_condition.as_ref())
            .map(ConditionNode::recipe_refs)
            .unwrap_or_default()
    }
}

// ============================================================================
// Raw content helpers
// ============================================================================

/// Looks up a field, preferring an exact match over a case-insensitive one.
pub(crate) fn field<'v>(map: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Reads an identifier written as a string or a number.
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads an integer written as a number or a numeric string.
pub(crate) fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_category(position: usize, entry: &Value) -> ConfigResult<Category> {
    let invalid = || {
        ConfigError::InvalidDocument(format!(
            "category entry {position} must be `{{id: text_ref}}` or `{{id, display_text_ref}}`"
        ))
    };
    let map = entry.as_object().ok_or_else(invalid)?;

    if let Some(id) = field(map, "id") {
        let id = text(id).ok_or_else(invalid)?;
        let display = field(map, "display_text_ref").and_then(text);
        return Ok(Category::new(id, display));
    }

    match map.iter().next() {
        Some((id, display)) if map.len() == 1 && !id.trim().is_empty() => {
            Ok(Category::new(id.as_str(), text(display)))
        },
        _ => Err(invalid()),
    }
}

fn parse_recipe(key: &str, entry: &Value) -> ConfigResult<Recipe> {
    let id = RecipeId::new(key);
    if id.as_str().is_empty() {
        return Err(ConfigError::InvalidDocument("recipe ids must not be empty".into()));
    }
    let map = entry.as_object().ok_or_else(|| ConfigError::InvalidField {
        recipe: id.clone(),
        field: "recipe".into(),
        reason: "expected an object".into(),
    })?;

    let required_text = |name: &'static str| -> ConfigResult<String> {
        let value = field(map, name).ok_or_else(|| ConfigError::MissingField {
            recipe: id.clone(),
            field: name,
        })?;
        text(value).ok_or_else(|| ConfigError::InvalidField {
            recipe: id.clone(),
            field: name.into(),
            reason: format!("expected an id, found `{value}`"),
        })
    };
    let positive = |name: String, value: &Value| -> ConfigResult<u32> {
        integer(value)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| ConfigError::InvalidField {
                recipe: id.clone(),
                field: name,
                reason: format!("expected a positive integer, found `{value}`"),
            })
    };

    let result = required_text("result")?;
    let category = required_text("category")?;
    let quantity = field(map, "quantity").ok_or_else(|| ConfigError::MissingField {
        recipe: id.clone(),
        field: "quantity",
    })?;
    let result_quantity = positive("quantity".into(), quantity)?;

    let ingredients = match field(map, "ingredients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(item, qty)| -> ConfigResult<RecipeIngredient> {
                let quantity = positive(format!("ingredients.{item}"), qty)?;
                Ok(RecipeIngredient::new(item.as_str(), quantity))
            })
            .collect::<ConfigResult<_>>()?,
        Some(other) => {
            return Err(ConfigError::InvalidField {
                recipe: id.clone(),
                field: "ingredients".into(),
                reason: format!("expected a map of item to quantity, found `{other}`"),
            })
        },
    };

    let unlock_condition = match field(map, "unlock_condition") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(conditions::normalize(raw, &id)?),
    };

    Ok(Recipe {
        id,
        category: CategoryId::new(category),
        result: ItemId::new(result),
        result_quantity,
        ingredients,
        unlock_condition,
    })
}
