//! Craftbook CLI - inspect and exercise recipe catalogs.
//!
//! Usage:
//!   craftbook init-config                          Write the effective configuration
//!   craftbook check                                Lint the catalog
//!   craftbook status --session <file>              Show unlock and craft status
//!   craftbook craft --session <file> <recipe>      Craft and save the session
//!   craftbook unlock --session <file> <recipe>     Unlock a recipe
//!   craftbook lock --session <file> <recipe>       Lock a recipe

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use craftbook_common::CategoryId;
use craftbook_engine::config::{CraftbookConfig, CONFIG_FILE};
use craftbook_engine::recipe_loader::{load_catalog, CatalogLint};
use craftbook_engine::session::Session;
use craftbook_gameplay::{Catalog, CategoryFilter, CraftSystem, EvalContext, RecipeView};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "craftbook")]
#[command(about = "Inspect and exercise crafting recipe catalogs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the tool configuration
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Catalog file (overrides `catalog_path`)
    #[arg(long, global = true, env = "CRAFTBOOK_CATALOG")]
    catalog: Option<PathBuf>,

    /// Refresh sweep bound (overrides `max_refresh_sweeps`)
    #[arg(long, global = true)]
    max_sweeps: Option<usize>,

    /// Log filter used when RUST_LOG is unset (overrides `log_filter`)
    #[arg(long, global = true)]
    log_filter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration, overrides included, to the config path
    InitConfig,

    /// Load the catalog and report content problems
    Check {
        /// Exit with an error if any problem is found
        #[arg(long)]
        strict: bool,
    },

    /// Show unlock and craft status for a session
    Status {
        /// Session JSON file
        #[arg(short, long)]
        session: PathBuf,

        /// Only show one category
        #[arg(long)]
        category: Option<String>,

        /// Only show unlocked recipes
        #[arg(long)]
        available: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Craft a recipe and save the session
    Craft {
        /// Session JSON file
        #[arg(short, long)]
        session: PathBuf,

        /// Recipe id
        recipe: String,

        /// Number of crafts
        #[arg(short = 'n', long, default_value_t = 1)]
        amount: u32,

        /// Craft as many as possible
        #[arg(long, conflicts_with = "amount")]
        all: bool,
    },

    /// Unlock a recipe and save the session
    Unlock {
        /// Session JSON file
        #[arg(short, long)]
        session: PathBuf,

        /// Recipe id
        recipe: String,
    },

    /// Lock a recipe and save the session
    Lock {
        /// Session JSON file
        #[arg(short, long)]
        session: PathBuf,

        /// Recipe id
        recipe: String,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut CraftbookConfig) {
        if let Some(catalog) = &self.catalog {
            config.catalog_path.clone_from(catalog);
        }
        if let Some(sweeps) = self.max_sweeps {
            config.max_refresh_sweeps = Some(sweeps);
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter.clone_from(filter);
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CraftbookConfig::load_from(&cli.config);
    cli.apply_overrides(&mut config);
    config.validate();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("Invalid log filter")?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("Craftbook {}", env!("CARGO_PKG_VERSION"));

    if matches!(cli.command, Commands::InitConfig) {
        config
            .save_to(&cli.config)
            .with_context(|| format!("Failed to write config {}", cli.config.display()))?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let catalog = load_catalog(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {}", config.catalog_path.display()))?;

    match cli.command {
        Commands::InitConfig => Ok(()),
        Commands::Check { strict } => check(&catalog, strict),
        Commands::Status {
            session,
            category,
            available,
            json,
        } => status(&catalog, &config, &session, category, available, json),
        Commands::Craft {
            session,
            recipe,
            amount,
            all,
        } => craft(&catalog, &config, &session, &recipe, amount, all),
        Commands::Unlock { session, recipe } => set_unlocked(&catalog, &config, &session, &recipe, true),
        Commands::Lock { session, recipe } => set_unlocked(&catalog, &config, &session, &recipe, false),
    }
}

fn check(catalog: &Catalog, strict: bool) -> Result<()> {
    let lint = CatalogLint::run(catalog);

    println!(
        "{} recipes in {} categories",
        catalog.len(),
        catalog.categories().len()
    );
    for (recipe, target) in &lint.dangling_references {
        println!("  dangling   {recipe} -> {target}");
    }
    for recipe in &lint.dependency_cycles {
        println!("  cycle      {recipe}");
    }
    for recipe in &lint.uncraftable {
        println!("  no input   {recipe}");
    }
    for (recipe, category) in &lint.undeclared_categories {
        println!("  category   {recipe} ({category})");
    }

    if strict && !lint.is_empty() {
        bail!("{} catalog problems found", lint.len());
    }
    Ok(())
}

fn status(
    catalog: &Catalog,
    config: &CraftbookConfig,
    session_path: &Path,
    category: Option<String>,
    available: bool,
    json: bool,
) -> Result<()> {
    let mut session = Session::load(session_path).context("Failed to load session")?;
    let (flags, items, unlocks) = session.parts_mut();
    let system = CraftSystem::new(catalog, unlocks).with_settings(config.sync_settings());
    let ctx = EvalContext::new(flags, &*items);

    if let Some(report) = system.sync(&ctx) {
        info!("Synchronized unlocks: {report:?}");
    }

    let filter = category.map_or(CategoryFilter::All, |c| {
        CategoryFilter::Category(CategoryId::new(c))
    });
    let ids = if available {
        system.recipes_for(&filter, &ctx)
    } else {
        catalog
            .recipes()
            .filter(|recipe| match &filter {
                CategoryFilter::All => true,
                CategoryFilter::Category(category) => recipe.category == *category,
            })
            .map(|recipe| &recipe.id)
            .collect()
    };
    let views: Vec<RecipeView> = ids
        .into_iter()
        .filter_map(|id| system.recipe_view(id.as_str(), &ctx))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!("{:<24} {:<16} {:<8} {:>5}", "RECIPE", "CATEGORY", "STATE", "MAX");
    for view in &views {
        println!(
            "{:<24} {:<16} {:<8} {:>5}",
            view.id.as_str(),
            view.category_name,
            if view.unlocked { "unlocked" } else { "locked" },
            view.max_craft
        );
    }
    Ok(())
}

fn craft(
    catalog: &Catalog,
    config: &CraftbookConfig,
    session_path: &Path,
    recipe: &str,
    amount: u32,
    all: bool,
) -> Result<()> {
    let mut session = Session::load(session_path).context("Failed to load session")?;
    let committed = {
        let (flags, items, unlocks) = session.parts_mut();
        let system = CraftSystem::new(catalog, unlocks).with_settings(config.sync_settings());
        if all {
            system.craft_all(recipe, flags, items)
        } else {
            system.craft(recipe, amount, flags, items)
        }
    };
    if !committed {
        bail!("Cannot craft `{recipe}`: locked, unknown, or missing ingredients");
    }

    session.save(session_path).context("Failed to save session")?;
    let produced = catalog
        .get(recipe)
        .map_or(0, |r| session.inventory.count(r.result.as_str()));
    println!("Crafted `{recipe}`; now holding {produced}");
    Ok(())
}

fn set_unlocked(
    catalog: &Catalog,
    config: &CraftbookConfig,
    session_path: &Path,
    recipe: &str,
    unlocked: bool,
) -> Result<()> {
    let mut session = Session::load(session_path).context("Failed to load session")?;
    let changed = {
        let (flags, items, unlocks) = session.parts_mut();
        let system = CraftSystem::new(catalog, unlocks).with_settings(config.sync_settings());
        let ctx = EvalContext::new(flags, &*items);
        if unlocked {
            system.unlock(recipe, &ctx)
        } else {
            system.lock(recipe, &ctx)
        }
    };
    if !changed {
        bail!("Unknown recipe `{recipe}`");
    }

    session.save(session_path).context("Failed to save session")?;
    println!(
        "Recipe `{recipe}` {}",
        if unlocked { "unlocked" } else { "locked" }
    );
    Ok(())
}
