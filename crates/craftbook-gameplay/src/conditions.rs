//! Unlock conditions.
//!
//! This module provides:
//! - The [`ConditionNode`] tree every recipe's unlock condition is normalized into
//! - Normalization from raw catalog content
//! - The [`ConditionEvaluator`], which maps a tree plus game context to a boolean
//!
//! Evaluation never fails. Unknown operators and leaf kinds evaluate to
//! `false`, and a recipe reference that would re-enter a recipe already being
//! resolved on the current path evaluates to `false` as well.

use craftbook_common::{ItemId, QuestId, RecipeId, SwitchId, VariableId};
use serde_json::{Map, Value};
use tracing::trace;

use crate::game_state::EvalContext;
use crate::recipes::{self, ConfigError};

// ============================================================================
// Condition tree
// ============================================================================

/// Boolean operator over child conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `and` / `all`: every child holds (true when empty).
    All,
    /// `or` / `any`: at least one child holds (false when empty).
    Any,
    /// `not` / `none`: no child holds (true when empty).
    None,
    /// Operator name the catalog did not recognise.
    Unknown(String),
}

impl Operator {
    /// Parses an operator name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "and" | "all" => Self::All,
            "or" | "any" => Self::Any,
            "not" | "none" => Self::None,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Primitive unlock predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Game switch is on.
    Switch(SwitchId),
    /// Game variable is at least `min`.
    Variable {
        /// Variable to read
        id: VariableId,
        /// Inclusive lower bound
        min: i64,
    },
    /// Quest has been completed.
    Quest(QuestId),
    /// Another recipe is unlocked.
    Recipe(RecipeId),
    /// The inventory holds at least `quantity` of `item`.
    Item {
        /// Item to count
        item: ItemId,
        /// Required amount; zero or negative never holds
        quantity: i64,
    },
    /// Unlock state is set explicitly by the game.
    Manual {
        /// State seeded the first time the recipe is tracked
        default: bool,
    },
    /// Leaf kind the catalog did not recognise.
    Unknown(String),
}

/// Normalized unlock condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionNode {
    /// Operator over children.
    Operator {
        /// Combining operator
        op: Operator,
        /// Child conditions, possibly empty
        children: Vec<ConditionNode>,
    },
    /// Single predicate.
    Leaf(Condition),
}

impl ConditionNode {
    /// `AND` over `children`.
    #[must_use]
    pub fn all(children: Vec<ConditionNode>) -> Self {
        Self::Operator {
            op: Operator::All,
            children,
        }
    }

    /// `OR` over `children`.
    #[must_use]
    pub fn any(children: Vec<ConditionNode>) -> Self {
        Self::Operator {
            op: Operator::Any,
            children,
        }
    }

    /// `NOT` over `children`.
    #[must_use]
    pub fn none(children: Vec<ConditionNode>) -> Self {
        Self::Operator {
            op: Operator::None,
            children,
        }
    }

    /// Switch leaf.
    #[must_use]
    pub fn switch(id: u32) -> Self {
        Self::Leaf(Condition::Switch(SwitchId::new(id)))
    }

    /// Variable leaf.
    #[must_use]
    pub fn variable(id: u32, min: i64) -> Self {
        Self::Leaf(Condition::Variable {
            id: VariableId::new(id),
            min,
        })
    }

    /// Quest leaf.
    #[must_use]
    pub fn quest(id: u32) -> Self {
        Self::Leaf(Condition::Quest(QuestId::new(id)))
    }

    /// Recipe reference leaf.
    #[must_use]
    pub fn recipe(target: impl Into<RecipeId>) -> Self {
        Self::Leaf(Condition::Recipe(target.into()))
    }

    /// Item leaf.
    #[must_use]
    pub fn item(item: impl Into<ItemId>, quantity: i64) -> Self {
        Self::Leaf(Condition::Item {
            item: item.into(),
            quantity,
        })
    }

    /// Manual leaf.
    #[must_use]
    pub fn manual(default: bool) -> Self {
        Self::Leaf(Condition::Manual { default })
    }

    /// Returns the declared default when the whole condition is a manual leaf.
    #[must_use]
    pub fn manual_default(&self) -> Option<bool> {
        match self {
            Self::Leaf(Condition::Manual { default }) => Some(*default),
            _ => None,
        }
    }

    /// Whether the whole condition is a manual leaf.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.manual_default().is_some()
    }

    /// Whether any leaf in the tree references `target`.
    #[must_use]
    pub fn references(&self, target: &str) -> bool {
        match self {
            Self::Operator { children, .. } => children.iter().any(|c| c.references(target)),
            Self::Leaf(Condition::Recipe(id)) => id.as_str() == target,
            Self::Leaf(_) => false,
        }
    }

    /// All recipe ids referenced anywhere in the tree, in tree order.
    #[must_use]
    pub fn recipe_refs(&self) -> Vec<&RecipeId> {
        let mut refs = Vec::new();
        self.collect_recipe_refs(&mut refs);
        refs
    }

    fn collect_recipe_refs<'a>(&'a self, out: &mut Vec<&'a RecipeId>) {
        match self {
            Self::Operator { children, .. } => {
                for child in children {
                    child.collect_recipe_refs(out);
                }
            },
            Self::Leaf(Condition::Recipe(id)) => out.push(id),
            Self::Leaf(_) => {},
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalizes a raw condition into a tree.
///
/// Accepts an `operator` object, a `type` object, or a bare list (an implicit
/// `AND`). `recipe` is only used to label errors.
pub(crate) fn normalize(value: &Value, recipe: &RecipeId) -> Result<ConditionNode, ConfigError> {
    match value {
        Value::Array(items) => Ok(ConditionNode::all(normalize_list(items, recipe)?)),
        Value::Object(map) => match recipes::field(map, "operator") {
            Some(op) => normalize_operator(op, map, recipe),
            None => normalize_leaf(map, recipe),
        },
        _ => Err(ConfigError::InvalidField {
            recipe: recipe.clone(),
            field: "unlock_condition".into(),
            reason: format!("expected an object or a list, found `{value}`"),
        }),
    }
}

fn normalize_list(items: &[Value], recipe: &RecipeId) -> Result<Vec<ConditionNode>, ConfigError> {
    items.iter().map(|item| normalize(item, recipe)).collect()
}

fn normalize_operator(
    op: &Value,
    map: &Map<String, Value>,
    recipe: &RecipeId,
) -> Result<ConditionNode, ConfigError> {
    let name = recipes::text(op).ok_or_else(|| ConfigError::InvalidField {
        recipe: recipe.clone(),
        field: "operator".into(),
        reason: format!("expected a name, found `{op}`"),
    })?;

    let children = match recipes::field(map, "conditions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => normalize_list(items, recipe)?,
        Some(single) => vec![normalize(single, recipe)?],
    };

    Ok(ConditionNode::Operator {
        op: Operator::parse(&name),
        children,
    })
}

fn normalize_leaf(map: &Map<String, Value>, recipe: &RecipeId) -> Result<ConditionNode, ConfigError> {
    let kind = recipes::field(map, "type")
        .and_then(recipes::text)
        .map(|kind| kind.trim().to_ascii_lowercase())
        .ok_or_else(|| ConfigError::MissingField {
            recipe: recipe.clone(),
            field: "unlock_condition.type",
        })?;

    let required = |field: &'static str| {
        recipes::field(map, field).ok_or_else(|| ConfigError::MissingConditionField {
            recipe: recipe.clone(),
            kind: kind.clone(),
            field,
        })
    };
    let integer = |field: &'static str, value: &Value| {
        recipes::integer(value).ok_or_else(|| ConfigError::InvalidField {
            recipe: recipe.clone(),
            field: field.into(),
            reason: format!("expected an integer, found `{value}`"),
        })
    };
    let numeric_id = |field: &'static str| -> Result<u32, ConfigError> {
        let value = required(field)?;
        let raw = integer(field, value)?;
        u32::try_from(raw).map_err(|_| ConfigError::InvalidField {
            recipe: recipe.clone(),
            field: field.into(),
            reason: format!("id {raw} is out of range"),
        })
    };
    let optional_integer = |field: &'static str, default: i64| match recipes::field(map, field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => integer(field, value),
    };

    let condition = match kind.as_str() {
        "switch" => Condition::Switch(SwitchId::new(numeric_id("id")?)),
        "variable" => Condition::Variable {
            id: VariableId::new(numeric_id("id")?),
            min: optional_integer("value", 1)?,
        },
        "quest" => Condition::Quest(QuestId::new(numeric_id("id")?)),
        "recipe" => {
            let key = required("key")?;
            let key = recipes::text(key).ok_or_else(|| ConfigError::InvalidField {
                recipe: recipe.clone(),
                field: "key".into(),
                reason: format!("expected a recipe id, found `{key}`"),
            })?;
            Condition::Recipe(RecipeId::new(key))
        },
        "item" => {
            let item = required("item")?;
            let item = recipes::text(item).ok_or_else(|| ConfigError::InvalidField {
                recipe: recipe.clone(),
                field: "item".into(),
                reason: format!("expected an item id, found `{item}`"),
            })?;
            let quantity = match recipes::field(map, "quantity") {
                None | Some(Value::Null) => optional_integer("count", 1)?,
                Some(value) => integer("quantity", value)?,
            };
            Condition::Item {
                item: ItemId::new(item),
                quantity,
            }
        },
        "manual" => {
            let default = match recipes::field(map, "value") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(value)) => *value,
                Some(other) => {
                    return Err(ConfigError::InvalidField {
                        recipe: recipe.clone(),
                        field: "value".into(),
                        reason: format!("expected a boolean, found `{other}`"),
                    })
                },
            };
            Condition::Manual { default }
        },
        _ => Condition::Unknown(kind.clone()),
    };

    Ok(ConditionNode::Leaf(condition))
}

// ============================================================================
// Evaluation
// ============================================================================

/// Unlock-store facts the evaluator needs about other recipes.
///
/// Implemented by the unlock tracker, so that a recipe reference resolves
/// through the same rules as a direct `is_unlocked` query.
pub trait RecipeStatus {
    /// Whether the unlock store holds an entry for `id`.
    fn is_tracked(&self, id: &RecipeId, ctx: &EvalContext<'_>) -> bool;

    /// Stored unlock value for `id`.
    fn stored(&self, id: &RecipeId, ctx: &EvalContext<'_>) -> Option<bool>;

    /// Whether `id` is a manual recipe, whose stored value is authoritative.
    fn is_manual(&self, id: &RecipeId) -> bool;

    /// Resolves whether `id` is unlocked. `path` already excludes `id`.
    fn resolve(&self, id: &RecipeId, ctx: &EvalContext<'_>, path: &mut ResolvePath) -> bool;
}

/// Recipes currently being resolved on the active call path.
#[derive(Debug, Clone, Default)]
pub struct ResolvePath {
    stack: Vec<RecipeId>,
    cycles: Vec<RecipeId>,
}

impl ResolvePath {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is being resolved.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.stack.iter().any(|entry| entry.as_str() == id)
    }

    /// The recipe whose condition is being evaluated.
    #[must_use]
    pub fn current(&self) -> Option<&RecipeId> {
        self.stack.last()
    }

    /// Recipes whose resolution was cut short because they were already on the path.
    #[must_use]
    pub fn cycle_hits(&self) -> &[RecipeId] {
        &self.cycles
    }

    pub(crate) fn push(&mut self, id: &RecipeId) {
        self.stack.push(id.clone());
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    fn record_cycle(&mut self, id: &RecipeId) {
        if !self.cycles.contains(id) {
            self.cycles.push(id.clone());
        }
    }
}

/// Evaluates condition trees against a game context.
pub struct ConditionEvaluator<'a> {
    status: &'a dyn RecipeStatus,
    ctx: EvalContext<'a>,
}

impl<'a> ConditionEvaluator<'a> {
    /// Creates an evaluator.
    #[must_use]
    pub fn new(status: &'a dyn RecipeStatus, ctx: EvalContext<'a>) -> Self {
        Self { status, ctx }
    }

    /// Evaluates `node`. Recipes on `path` are treated as unresolvable.
    pub fn evaluate(&self, node: &ConditionNode, path: &mut ResolvePath) -> bool {
        match node {
            ConditionNode::Operator { op, children } => self.evaluate_operator(op, children, path),
            ConditionNode::Leaf(condition) => self.evaluate_leaf(condition, path),
        }
    }

    fn evaluate_operator(
        &self,
        op: &Operator,
        children: &[ConditionNode],
        path: &mut ResolvePath,
    ) -> bool {
        match op {
            Operator::All => children.iter().all(|c| self.evaluate(c, path)),
            Operator::Any => children.iter().any(|c| self.evaluate(c, path)),
            Operator::None => !children.iter().any(|c| self.evaluate(c, path)),
            Operator::Unknown(name) => {
                trace!("Unknown condition operator `{name}` evaluates to false");
                false
            },
        }
    }

    fn evaluate_leaf(&self, condition: &Condition, path: &mut ResolvePath) -> bool {
        match condition {
            Condition::Switch(id) => self.ctx.game.switch(*id),
            Condition::Variable { id, min } => self.ctx.game.variable(*id) >= *min,
            Condition::Quest(id) => self.ctx.game.quest_finished(*id),
            Condition::Recipe(target) => {
                if !self.status.is_tracked(target, &self.ctx) {
                    return false;
                }
                if path.contains(target.as_str()) {
                    trace!("Recipe reference to `{target}` re-enters the resolve path");
                    path.record_cycle(target);
                    return false;
                }
                self.status.resolve(target, &self.ctx, path)
            },
            Condition::Item { item, quantity } => match u32::try_from(*quantity) {
                Ok(quantity) if quantity > 0 => self.ctx.items.quantity(item) >= quantity,
                _ => false,
            },
            Condition::Manual { default } => match path.current() {
                Some(id) if self.status.is_manual(id) => {
                    self.status.stored(id, &self.ctx).unwrap_or(*default)
                },
                _ => *default,
            },
            Condition::Unknown(kind) => {
                trace!("Unknown condition kind `{kind}` evaluates to false");
                false
            },
        }
    }
}
