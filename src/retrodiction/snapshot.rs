//! Retrodiction snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{RegimeEventId, SnapshotId, Turn};
use crate::regime::types::RegimeType;
use crate::world::state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotCause {
    RegimeChange,
    Periodic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl SnapshotPriority {
    /// Monotonic banding of event confidence
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            SnapshotPriority::Critical
        } else if confidence >= 0.75 {
            SnapshotPriority::High
        } else if confidence >= 0.5 {
            SnapshotPriority::Normal
        } else {
            SnapshotPriority::Low
        }
    }
}

/// Read-only record of why and when a retrodiction was requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrodictionSnapshot {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub cause: SnapshotCause,
    pub priority: SnapshotPriority,
    pub linked_regime_event_id: Option<RegimeEventId>,
    /// Regime the scenarios are built for, when known
    pub regime_type: Option<RegimeType>,
    pub turn: Option<Turn>,
    pub evidence: BTreeMap<String, f64>,
    /// World at the moment of the snapshot, when one was attached
    pub world_state: Option<WorldState>,
}

impl RetrodictionSnapshot {
    pub fn with_world_state(mut self, state: &WorldState) -> Self {
        self.world_state = Some(state.snapshot());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_monotonic() {
        let mut last = SnapshotPriority::Low;
        for i in 0..=100 {
            let p = SnapshotPriority::from_confidence(i as f64 / 100.0);
            assert!(p >= last);
            last = p;
        }
        assert_eq!(SnapshotPriority::from_confidence(0.95), SnapshotPriority::Critical);
        assert_eq!(SnapshotPriority::from_confidence(0.2), SnapshotPriority::Low);
    }

    #[test]
    fn test_cause_serialization() {
        assert_eq!(
            serde_json::to_string(&SnapshotCause::RegimeChange).unwrap(),
            "\"REGIME_CHANGE\""
        );
    }
}
