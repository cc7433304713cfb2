//! Tool configuration.
//!
//! Settings are read from `craftbook.toml`. A missing or unreadable file falls
//! back to defaults; command-line flags override whatever was loaded.

use craftbook_gameplay::SyncSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "craftbook.toml";

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "craftbook=info";

/// Upper bound accepted for `max_refresh_sweeps`.
const MAX_REFRESH_SWEEPS: usize = 100_000;

/// Craftbook tool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftbookConfig {
    /// Catalog file (`.json` or `.ron`)
    pub catalog_path: PathBuf,
    /// Refresh sweep bound (None = catalog size + 1)
    pub max_refresh_sweeps: Option<usize>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for CraftbookConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("assets/recipes.json"),
            max_refresh_sweeps: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CraftbookConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values to usable ranges.
    pub fn validate(&mut self) {
        self.max_refresh_sweeps = self
            .max_refresh_sweeps
            .map(|sweeps| sweeps.clamp(1, MAX_REFRESH_SWEEPS));

        if self.log_filter.trim().is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
    }

    /// Synchronizer settings derived from this config.
    #[must_use]
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_sweeps: self.max_refresh_sweeps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CraftbookConfig::default();
        assert_eq!(config.catalog_path, PathBuf::from("assets/recipes.json"));
        assert_eq!(config.max_refresh_sweeps, None);
        assert_eq!(config.log_filter, "craftbook=info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = CraftbookConfig {
            max_refresh_sweeps: Some(0),
            log_filter: "  ".to_string(),
            ..CraftbookConfig::default()
        };

        config.validate();

        assert_eq!(config.max_refresh_sweeps, Some(1));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.sync_settings().max_sweeps, Some(1));
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let config = CraftbookConfig {
            catalog_path: PathBuf::from("data/crafting.ron"),
            max_refresh_sweeps: Some(12),
            log_filter: "craftbook=debug".to_string(),
        };
        config.save_to(&config_path).expect("Failed to save config");

        let loaded = CraftbookConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "max_refresh_sweeps = 4\n").expect("write config");

        let loaded = CraftbookConfig::load_from(&config_path);
        assert_eq!(loaded.max_refresh_sweeps, Some(4));
        assert_eq!(loaded.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = CraftbookConfig::load_from("/nonexistent/path/craftbook.toml");
        assert_eq!(config, CraftbookConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "max_refresh_sweeps = \"many\"").expect("write config");

        assert_eq!(CraftbookConfig::load_from(&config_path), CraftbookConfig::default());
    }
}
