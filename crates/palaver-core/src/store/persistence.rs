//! Durable session state.
//!
//! The session list and active pointer are stored as one JSON document.
//! Cancellation handles and the model catalog are live-only and never
//! written. On restore, every session is reset to an idle state.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::session::Session;

/// The persisted slice of store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub sessions: Vec<Session>,
    pub active_id: String,
}

/// Writes the state file atomically (write to temp, then rename).
pub fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }

    let json = serde_json::to_string(state).context("Failed to serialize session state")?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json).context("Failed to write temp state file")?;
    fs::rename(&temp_path, path).context("Failed to replace state file")?;
    Ok(())
}

/// Loads the state file, resetting live-only fields on every session.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let mut state: PersistedState =
        serde_json::from_str(&contents).context("Failed to parse session state")?;

    for session in &mut state.sessions {
        session.reset_live_state();
    }

    Ok(Some(state))
}
