//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Simulation turn counter
pub type Turn = u64;

/// Unique identifier for an emitted regime change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegimeEventId(pub Uuid);

impl RegimeEventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegimeEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegimeEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a retrodiction snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fresh simulation identifier for runs that are not given one
pub fn new_sim_id() -> String {
    format!("sim-{}", Uuid::new_v4().simple())
}
