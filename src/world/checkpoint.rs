//! JSON checkpoints of WorldState
//!
//! Files are named `{prefix}_turn_{n}.json`. Writing is blocking but bounded
//! to one small file; loading re-validates the state invariants.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{PulseError, Result};
use crate::core::types::Turn;
use crate::world::state::WorldState;

/// Path of the checkpoint for `turn` under `prefix`
pub fn checkpoint_path(prefix: &Path, turn: Turn) -> PathBuf {
    PathBuf::from(format!("{}_turn_{}.json", prefix.display(), turn))
}

/// Serialize the state to `{prefix}_turn_{state.turn}.json`
pub fn save_checkpoint(state: &WorldState, prefix: &Path) -> Result<PathBuf> {
    let path = checkpoint_path(prefix, state.turn);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json)?;
    tracing::debug!(turn = state.turn, path = %path.display(), "Checkpoint written");
    Ok(path)
}

/// Restore a state from a checkpoint file
///
/// A checkpoint that violates the invariants (e.g. an overlay outside [0, 1])
/// is rejected rather than repaired.
pub fn load_checkpoint(path: &Path) -> Result<WorldState> {
    let content = fs::read_to_string(path)?;
    let state: WorldState = serde_json::from_str(&content)?;
    state.validate().map_err(|e| {
        PulseError::InvalidConfig(format!("Checkpoint {} is invalid: {}", path.display(), e))
    })?;
    Ok(state)
}
