//! Per-turn simulation output

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::Turn;
use crate::gravity::fabric::GravityCorrection;
use crate::gravity::shadow::GravityOverrideTrigger;
use crate::simulation::tagging::SymbolicTag;
use crate::simulation::trust::TrustMetadata;
use crate::world::state::WorldState;

/// Change in every overlay and variable over one turn
///
/// Names present on only one side count the missing side as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnDeltas {
    pub overlays: BTreeMap<String, f64>,
    pub variables: BTreeMap<String, f64>,
}

impl TurnDeltas {
    pub fn between(before: &WorldState, after: &WorldState) -> Self {
        Self {
            overlays: map_diff(before.overlays(), after.overlays()),
            variables: map_diff(before.variables(), after.variables()),
        }
    }

    /// Overlay with the largest absolute change, if any moved
    pub fn dominant_overlay(&self) -> Option<(&str, f64)> {
        self.overlays
            .iter()
            .filter(|(_, d)| **d != 0.0)
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(name, d)| (name.as_str(), *d))
    }
}

/// `after - before` over the union of keys
pub(crate) fn map_diff(
    before: &BTreeMap<String, f64>,
    after: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut diff: BTreeMap<String, f64> = after
        .iter()
        .map(|(k, v)| (k.clone(), v - before.get(k).copied().unwrap_or(0.0)))
        .collect();
    for (k, v) in before {
        diff.entry(k.clone()).or_insert(-v);
    }
    diff
}

/// Everything recorded for one completed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn: Turn,
    /// Simulated time at the end of the turn
    pub timestamp: DateTime<Utc>,
    pub overlays_snapshot: BTreeMap<String, f64>,
    pub variables_snapshot: BTreeMap<String, f64>,
    pub deltas: TurnDeltas,
    pub symbolic_tag: Option<SymbolicTag>,
    pub trust_metadata: Option<TrustMetadata>,
    pub gravity_corrections: Vec<GravityCorrection>,
    /// Rule ids committed this turn, in execution order
    pub fired_rules: Vec<String>,
    pub override_trigger: Option<GravityOverrideTrigger>,
}

impl TurnResult {
    pub fn correction_for(&self, variable: &str) -> Option<&GravityCorrection> {
        self.gravity_corrections
            .iter()
            .find(|c| c.variable == variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_cover_union_of_names() {
        let before = WorldState::new("t")
            .with_overlay("hope", 0.5)
            .and_then(|s| s.with_variable("gone", 2.0))
            .unwrap();
        let after = WorldState::new("t")
            .with_overlay("hope", 0.7)
            .and_then(|s| s.with_overlay("fear", 0.1))
            .unwrap();

        let deltas = TurnDeltas::between(&before, &after);
        assert!((deltas.overlays["hope"] - 0.2).abs() < 1e-12);
        assert!((deltas.overlays["fear"] - 0.1).abs() < 1e-12);
        assert_eq!(deltas.variables["gone"], -2.0);
    }

    #[test]
    fn test_dominant_overlay() {
        let mut deltas = TurnDeltas::default();
        deltas.overlays.insert("hope".into(), 0.01);
        deltas.overlays.insert("fear".into(), -0.2);
        assert_eq!(deltas.dominant_overlay(), Some(("fear", -0.2)));

        assert_eq!(TurnDeltas::default().dominant_overlay(), None);
    }
}
