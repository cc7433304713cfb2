//! Session fixtures.
//!
//! A session file is a JSON snapshot of what a running game would hand the
//! crafting system: switches, variables, finished quests, the inventory and
//! the persisted unlock map. The CLI reads one, runs a command against it and
//! writes it back when the command changed anything.

use std::fs;
use std::io;
use std::path::Path;

use craftbook_gameplay::{ensure_unlock_map, GameFlags, Inventory, UnlockMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors reading or writing a session file.
#[derive(Debug, Error)]
pub enum SessionError {
    /// File could not be read or written.
    #[error("Session file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// File is not a valid session document.
    #[error("Invalid session JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Game state snapshot used by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Switches, variables and finished quests
    pub flags: GameFlags,
    /// Items held
    pub inventory: Inventory,
    /// Persisted unlock states; absent until the first synchronization
    pub unlocks: Option<UnlockMap>,
}

impl Session {
    /// Reads a session file.
    pub fn load(path: &Path) -> SessionResult<Self> {
        let content = fs::read_to_string(path)?;
        let session: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded session from {} ({} item types)",
            path.display(),
            session.inventory.slot_count()
        );
        Ok(session)
    }

    /// Writes the session back as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> SessionResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved session to {}", path.display());
        Ok(())
    }

    /// Splits the session into the game view, the inventory and the unlock
    /// map, creating the map if the session has none yet.
    pub fn parts_mut(&mut self) -> (&GameFlags, &mut Inventory, &mut UnlockMap) {
        (
            &self.flags,
            &mut self.inventory,
            ensure_unlock_map(&mut self.unlocks),
        )
    }
}
