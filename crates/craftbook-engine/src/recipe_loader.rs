//! Catalog file loading and authoring checks.
//!
//! This module provides:
//! - Loading a catalog from a `.json` or `.ron` file
//! - A lint pass over a loaded catalog for content authors

use std::fs;
use std::path::Path;

use craftbook_common::{CategoryId, RecipeId};
use craftbook_gameplay::{Catalog, ConfigError, ConfigResult};
use tracing::{debug, info, warn};

/// Catalog file encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// JSON document
    Json,
    /// RON document using map syntax
    Ron,
}

impl CatalogFormat {
    /// Picks the format from a file extension. Anything but `.ron` is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Self::Ron,
            _ => Self::Json,
        }
    }
}

/// Loads a catalog file.
pub fn load_catalog(path: &Path) -> ConfigResult<Catalog> {
    let format = CatalogFormat::from_path(path);
    debug!("Loading {format:?} catalog from {}", path.display());

    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    match format {
        CatalogFormat::Json => Catalog::from_json_str(&content),
        CatalogFormat::Ron => Catalog::from_ron_str(&content),
    }
}

/// Content problems that do not stop a catalog from loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogLint {
    /// `(recipe, target)` recipe references to ids the catalog lacks
    pub dangling_references: Vec<(RecipeId, RecipeId)>,
    /// Recipes that depend on themselves through recipe references
    pub dependency_cycles: Vec<RecipeId>,
    /// Recipes without ingredients, which can never be crafted
    pub uncraftable: Vec<RecipeId>,
    /// `(recipe, category)` pairs naming an undeclared category
    pub undeclared_categories: Vec<(RecipeId, CategoryId)>,
}

impl CatalogLint {
    /// Runs every check over `catalog`.
    #[must_use]
    pub fn run(catalog: &Catalog) -> Self {
        let lint = Self {
            dangling_references: catalog
                .dangling_references()
                .into_iter()
                .map(|(recipe, target)| (recipe.clone(), target.clone()))
                .collect(),
            dependency_cycles: catalog.dependency_cycles().into_iter().cloned().collect(),
            uncraftable: catalog
                .recipes()
                .filter(|recipe| recipe.ingredients.is_empty())
                .map(|recipe| recipe.id.clone())
                .collect(),
            undeclared_categories: catalog
                .recipes()
                .filter(|recipe| catalog.category(recipe.category.as_str()).is_none())
                .map(|recipe| (recipe.id.clone(), recipe.category.clone()))
                .collect(),
        };
        lint.log();
        lint
    }

    /// Number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dangling_references.len()
            + self.dependency_cycles.len()
            + self.uncraftable.len()
            + self.undeclared_categories.len()
    }

    /// Whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn log(&self) {
        for (recipe, target) in &self.dangling_references {
            warn!("Recipe `{recipe}` references unknown recipe `{target}`");
        }
        for recipe in &self.dependency_cycles {
            warn!("Recipe `{recipe}` can never unlock through its own reference chain");
        }
        for recipe in &self.uncraftable {
            warn!("Recipe `{recipe}` has no ingredients and cannot be crafted");
        }
        for (recipe, category) in &self.undeclared_categories {
            warn!("Recipe `{recipe}` uses undeclared category `{category}`");
        }
        if self.is_empty() {
            info!("Catalog lint found no problems");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const JSON_CATALOG: &str = r#"{
        "categories": [{"tools": 3}],
        "data": {
            "hammer": {"result": "hammer", "quantity": 1, "category": "tools",
                       "ingredients": {"iron": 3}},
            "anvil": {"result": "anvil", "quantity": 1, "category": "smithing",
                      "ingredients": {"iron": 20},
                      "unlock_condition": {"type": "recipe", "key": "forge"}},
            "gift": {"result": "gift", "quantity": 1, "category": "tools"}
        }
    }"#;

    const RON_CATALOG: &str = r#"{
        "categories": [{"tools": 3}],
        "recipes": {
            "hammer": {"result": "hammer", "quantity": 1, "category": "tools",
                       "ingredients": {"iron": 3}},
        },
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write catalog");
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CatalogFormat::from_path(Path::new("a.ron")), CatalogFormat::Ron);
        assert_eq!(CatalogFormat::from_path(Path::new("a.RON")), CatalogFormat::Ron);
        assert_eq!(CatalogFormat::from_path(Path::new("a.json")), CatalogFormat::Json);
        assert_eq!(CatalogFormat::from_path(Path::new("recipes")), CatalogFormat::Json);
    }

    #[test]
    fn test_load_json_catalog() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, "recipes.json", JSON_CATALOG);

        let catalog = load_catalog(&path).expect("loads");
        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains("anvil"));
    }

    #[test]
    fn test_load_ron_catalog() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, "recipes.ron", RON_CATALOG);

        let catalog = load_catalog(&path).expect("loads");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.category_name("tools"), "3");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_catalog(Path::new("/nonexistent/recipes.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, "recipes.json", r#"{"data": {"x": {"result": "x"}}}"#);

        assert!(matches!(
            load_catalog(&path),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_lint_findings() {
        let catalog = Catalog::from_json_str(JSON_CATALOG).expect("loads");
        let lint = CatalogLint::run(&catalog);

        assert_eq!(
            lint.dangling_references,
            vec![(RecipeId::new("anvil"), RecipeId::new("forge"))]
        );
        assert!(lint.dependency_cycles.is_empty());
        assert_eq!(lint.uncraftable, vec![RecipeId::new("gift")]);
        assert_eq!(
            lint.undeclared_categories,
            vec![(RecipeId::new("anvil"), CategoryId::new("smithing"))]
        );
        assert_eq!(lint.len(), 3);
    }

    #[test]
    fn test_lint_clean_catalog() {
        let catalog = Catalog::from_ron_str(RON_CATALOG).expect("loads");
        assert!(CatalogLint::run(&catalog).is_empty());
    }
}
