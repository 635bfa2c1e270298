//! RetrodictionTrigger - decides when a snapshot is materialised
//!
//! Regime changes produce snapshots unless the cooldown for their key has
//! not elapsed. The key is the cause alone (`PerCause`) or the cause plus
//! regime type (`PerRegimeType`). Periodic snapshots are spaced by their own
//! interval; manual requests always go through.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::RetrodictionConfig;
use crate::core::types::{SnapshotId, Turn};
use crate::regime::types::{RegimeChangeEvent, RegimeType};
use crate::retrodiction::snapshot::{RetrodictionSnapshot, SnapshotCause, SnapshotPriority};

/// Minimum spacing between snapshots sharing a cooldown key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CooldownWindow {
    Seconds {
        seconds: i64,
    },
    Turns {
        turns: u64,
    },
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// All regime changes share one cooldown
    #[default]
    PerCause,
    /// Each regime type has its own cooldown
    PerRegimeType,
}

type CooldownKey = (SnapshotCause, Option<RegimeType>);

#[derive(Debug, Clone, Copy)]
struct Mark {
    at: DateTime<Utc>,
    turn: Turn,
}

#[derive(Debug, Clone)]
pub struct RetrodictionTrigger {
    window: CooldownWindow,
    scope: CooldownScope,
    periodic_interval: Option<u64>,
    last: BTreeMap<CooldownKey, Mark>,
    current_turn: Option<Turn>,
    suppressed: u64,
}

impl RetrodictionTrigger {
    pub fn new(config: &RetrodictionConfig) -> Self {
        Self {
            window: config.cooldown,
            scope: config.cooldown_scope,
            periodic_interval: config.periodic_interval_turns,
            last: BTreeMap::new(),
            current_turn: None,
            suppressed: 0,
        }
    }

    /// Snapshots withheld by the cooldown so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn current_turn(&self) -> Option<Turn> {
        self.current_turn
    }

    /// Snapshot for a regime change, or None inside the cooldown
    pub fn handle_regime_change(&mut self, event: &RegimeChangeEvent) -> Option<RetrodictionSnapshot> {
        let regime_key = match self.scope {
            CooldownScope::PerCause => None,
            CooldownScope::PerRegimeType => Some(event.regime_type),
        };
        let key = (SnapshotCause::RegimeChange, regime_key);
        let now = Mark {
            at: event.timestamp,
            turn: self.current_turn.unwrap_or(0),
        };

        if let Some(last) = self.last.get(&key) {
            if self.within_cooldown(last, &now) {
                self.suppressed += 1;
                tracing::debug!(
                    regime = %event.regime_type,
                    event_id = %event.id,
                    "Regime change inside cooldown; no snapshot"
                );
                return None;
            }
        }
        self.last.insert(key, now);

        let snapshot = RetrodictionSnapshot {
            id: SnapshotId::new(),
            created_at: event.timestamp,
            cause: SnapshotCause::RegimeChange,
            priority: SnapshotPriority::from_confidence(event.confidence),
            linked_regime_event_id: Some(event.id),
            regime_type: Some(event.regime_type),
            turn: self.current_turn,
            evidence: event.evidence.clone(),
            world_state: None,
        };
        tracing::info!(
            snapshot = %snapshot.id,
            regime = %event.regime_type,
            priority = ?snapshot.priority,
            "Retrodiction snapshot created"
        );
        Some(snapshot)
    }

    /// Advance the trigger's turn clock; emits a PERIODIC snapshot on cadence
    pub fn tick_turn(&mut self, turn: Turn) -> Option<RetrodictionSnapshot> {
        self.tick_turn_at(turn, Utc::now())
    }

    pub fn tick_turn_at(&mut self, turn: Turn, now: DateTime<Utc>) -> Option<RetrodictionSnapshot> {
        self.current_turn = Some(turn);
        let interval = self.periodic_interval?;
        if turn == 0 || turn % interval != 0 {
            return None;
        }
        self.last.insert((SnapshotCause::Periodic, None), Mark { at: now, turn });

        let mut evidence = BTreeMap::new();
        evidence.insert("turn".to_string(), turn as f64);
        let snapshot = RetrodictionSnapshot {
            id: SnapshotId::new(),
            created_at: now,
            cause: SnapshotCause::Periodic,
            priority: SnapshotPriority::Low,
            linked_regime_event_id: None,
            regime_type: None,
            turn: Some(turn),
            evidence,
            world_state: None,
        };
        tracing::debug!(snapshot = %snapshot.id, turn, "Periodic snapshot created");
        Some(snapshot)
    }

    /// Operator-requested snapshot; never suppressed
    pub fn manual(
        &mut self,
        regime_type: Option<RegimeType>,
        evidence: BTreeMap<String, f64>,
    ) -> RetrodictionSnapshot {
        let now = Utc::now();
        self.last.insert(
            (SnapshotCause::Manual, None),
            Mark {
                at: now,
                turn: self.current_turn.unwrap_or(0),
            },
        );
        let snapshot = RetrodictionSnapshot {
            id: SnapshotId::new(),
            created_at: now,
            cause: SnapshotCause::Manual,
            priority: SnapshotPriority::High,
            linked_regime_event_id: None,
            regime_type,
            turn: self.current_turn,
            evidence,
            world_state: None,
        };
        tracing::info!(snapshot = %snapshot.id, "Manual snapshot created");
        snapshot
    }

    /// Forget all cooldown marks
    pub fn reset(&mut self) {
        self.last.clear();
        self.suppressed = 0;
    }

    fn within_cooldown(&self, last: &Mark, now: &Mark) -> bool {
        match self.window {
            CooldownWindow::Disabled => false,
            CooldownWindow::Seconds { seconds } => {
                now.at.signed_duration_since(last.at) < Duration::seconds(seconds)
            }
            CooldownWindow::Turns { turns } => now.turn.saturating_sub(last.turn) < turns,
        }
    }
}
