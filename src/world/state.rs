//! WorldState - the mutable simulation state
//!
//! Storage and copy only. Every write goes through `world::mutation`, which
//! enforces the overlay bounds and the finite-value invariant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{PulseError, Result};
use crate::core::types::Turn;

/// Overlays a fresh world starts with, all at the neutral midpoint
pub const DEFAULT_OVERLAYS: [&str; 5] = ["hope", "despair", "rage", "fear", "trust"];

/// Complete simulation state for one run
///
/// Maps are ordered so that iteration (rule evaluation, gravity, divergence)
/// is identical across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub sim_id: String,
    pub turn: Turn,
    overlays: BTreeMap<String, f64>,
    variables: BTreeMap<String, f64>,
    #[serde(default)]
    capital: BTreeMap<String, f64>,
    #[serde(default)]
    pub event_log: Vec<String>,
}

impl WorldState {
    /// Empty state at turn 0
    pub fn new(sim_id: impl Into<String>) -> Self {
        Self {
            sim_id: sim_id.into(),
            turn: 0,
            overlays: BTreeMap::new(),
            variables: BTreeMap::new(),
            capital: BTreeMap::new(),
            event_log: Vec::new(),
        }
    }

    /// State seeded with the default overlays at 0.5
    pub fn with_default_overlays(sim_id: impl Into<String>) -> Self {
        let mut state = Self::new(sim_id);
        for name in DEFAULT_OVERLAYS {
            state.overlays.insert(name.to_string(), 0.5);
        }
        state
    }

    /// Build a state from raw maps, rejecting anything that breaks the invariants
    ///
    /// This is the fatal initialisation path: an out-of-range overlay or a
    /// non-finite variable is returned to the caller rather than clamped.
    pub fn from_parts(
        sim_id: impl Into<String>,
        overlays: BTreeMap<String, f64>,
        variables: BTreeMap<String, f64>,
    ) -> Result<Self> {
        let state = Self {
            sim_id: sim_id.into(),
            turn: 0,
            overlays,
            variables,
            capital: BTreeMap::new(),
            event_log: Vec::new(),
        };
        state.validate()?;
        Ok(state)
    }

    /// Builder-style overlay insertion with the same checks as `from_parts`
    pub fn with_overlay(mut self, name: &str, value: f64) -> Result<Self> {
        check_overlay(name, value)?;
        self.overlays.insert(name.to_string(), value);
        Ok(self)
    }

    /// Builder-style variable insertion with the same checks as `from_parts`
    pub fn with_variable(mut self, name: &str, value: f64) -> Result<Self> {
        check_finite(name, value)?;
        self.variables.insert(name.to_string(), value);
        Ok(self)
    }

    /// Check every stored value against the state invariants
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.overlays {
            check_overlay(name, *value)?;
        }
        for (name, value) in self.variables.iter().chain(self.capital.iter()) {
            check_finite(name, *value)?;
        }
        Ok(())
    }

    /// Owned copy handed to components that only observe the world
    pub fn snapshot(&self) -> WorldState {
        self.clone()
    }

    pub fn overlay(&self, name: &str) -> Option<f64> {
        self.overlays.get(name).copied()
    }

    pub fn overlays(&self) -> &BTreeMap<String, f64> {
        &self.overlays
    }

    pub fn variable(&self, name: &str) -> Option<f64> {
        self.variables.get(name).copied()
    }

    pub fn variables(&self) -> &BTreeMap<String, f64> {
        &self.variables
    }

    pub fn capital(&self, asset: &str) -> Option<f64> {
        self.capital.get(asset).copied()
    }

    pub fn capital_holdings(&self) -> &BTreeMap<String, f64> {
        &self.capital
    }

    /// Whether `name` resolves to an overlay rather than a variable
    pub fn is_overlay(&self, name: &str) -> bool {
        self.overlays.contains_key(name)
    }

    pub(crate) fn overlays_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.overlays
    }

    pub(crate) fn variables_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.variables
    }

    pub(crate) fn capital_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.capital
    }
}

fn check_overlay(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(PulseError::InvalidStateValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PulseError::InvalidStateValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_overlays_are_neutral() {
        let state = WorldState::with_default_overlays("t");
        assert_eq!(state.overlays().len(), DEFAULT_OVERLAYS.len());
        assert!(state.overlays().values().all(|v| *v == 0.5));
        assert_eq!(state.turn, 0);
    }

    #[test]
    fn test_from_parts_rejects_out_of_range_overlay() {
        let overlays = BTreeMap::from([("hope".to_string(), 1.5)]);
        let result = WorldState::from_parts("t", overlays, BTreeMap::new());
        assert!(matches!(result, Err(PulseError::InvalidStateValue { .. })));
    }

    #[test]
    fn test_from_parts_rejects_nan_variable() {
        let variables = BTreeMap::from([("inflation".to_string(), f64::NAN)]);
        let result = WorldState::from_parts("t", BTreeMap::new(), variables);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_inserts() {
        let state = WorldState::new("t")
            .with_overlay("hope", 0.6)
            .and_then(|s| s.with_variable("interest_rate", 0.04))
            .unwrap();
        assert_eq!(state.overlay("hope"), Some(0.6));
        assert_eq!(state.variable("interest_rate"), Some(0.04));
        assert!(state.is_overlay("hope"));
        assert!(!state.is_overlay("interest_rate"));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let state = WorldState::with_default_overlays("t");
        let mut copy = state.snapshot();
        copy.overlays_mut().insert("hope".into(), 0.9);
        assert_eq!(state.overlay("hope"), Some(0.5));
    }

    #[test]
    fn test_json_round_trip_preserves_state() {
        let state = WorldState::with_default_overlays("t")
            .with_variable("gdp_growth", 0.02)
            .unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: WorldState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
