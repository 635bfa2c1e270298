//! Numeric <-> symbolic transform
//!
//! A mapping turns a weighted blend of overlays into a "symbolic pressure"
//! in [-1, 1] and from there into the value the variable is expected to
//! sit at. The inverse maps a numeric value back onto the pressure scale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{PulseError, Result};
use crate::world::state::WorldState;

/// Symbolic mapping for one numeric variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicMapping {
    pub variable: String,
    /// Expected value when every weighted overlay sits at 0.5
    pub baseline: f64,
    /// Distance from baseline at full positive or negative pressure
    pub sensitivity: f64,
    /// Overlay name -> signed weight
    pub weights: BTreeMap<String, f64>,
}

impl SymbolicMapping {
    pub fn new(variable: &str, baseline: f64, sensitivity: f64, weights: &[(&str, f64)]) -> Self {
        Self {
            variable: variable.to_string(),
            baseline,
            sensitivity,
            weights: weights
                .iter()
                .map(|(name, w)| (name.to_string(), *w))
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |reason: &str| PulseError::InvalidConfig(format!(
            "gravity mapping '{}': {}",
            self.variable, reason
        ));
        if self.variable.is_empty() {
            return Err(bad("variable name is empty"));
        }
        if !self.baseline.is_finite() {
            return Err(bad("baseline must be finite"));
        }
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(bad("sensitivity must be positive"));
        }
        if self.weights.is_empty() || self.weights.values().all(|w| *w == 0.0) {
            return Err(bad("needs at least one non-zero overlay weight"));
        }
        if self.weights.values().any(|w| !w.is_finite()) {
            return Err(bad("weights must be finite"));
        }
        Ok(())
    }

    /// Weighted overlay blend rescaled into [-1, 1]
    pub fn symbolic_pressure(&self, state: &WorldState) -> Result<f64> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (overlay, weight) in &self.weights {
            let value = state.overlay(overlay).ok_or_else(|| PulseError::GravityCorrection {
                variable: self.variable.clone(),
                reason: format!("overlay '{}' is not present", overlay),
            })?;
            weighted += weight * (value - 0.5) * 2.0;
            total_weight += weight.abs();
        }
        if total_weight == 0.0 {
            return Err(PulseError::GravityCorrection {
                variable: self.variable.clone(),
                reason: "mapping has no weight".to_string(),
            });
        }
        Ok((weighted / total_weight).clamp(-1.0, 1.0))
    }

    /// Value the variable is expected to sit at given the current overlays
    pub fn expected_value(&self, state: &WorldState) -> Result<f64> {
        Ok(self.baseline + self.sensitivity * self.symbolic_pressure(state)?)
    }

    /// Numeric -> symbolic: where `value` sits on the pressure scale
    pub fn implied_pressure(&self, value: f64) -> f64 {
        ((value - self.baseline) / self.sensitivity).clamp(-1.0, 1.0)
    }
}

/// Mappings for the standard macro indicators
pub fn default_mappings() -> Vec<SymbolicMapping> {
    vec![
        SymbolicMapping::new(
            "consumer_confidence",
            0.5,
            0.3,
            &[("hope", 1.0), ("trust", 0.5), ("fear", -0.5)],
        ),
        SymbolicMapping::new(
            "gdp_growth",
            0.02,
            0.03,
            &[("hope", 1.0), ("despair", -1.0), ("fear", -0.5)],
        ),
        SymbolicMapping::new(
            "inflation",
            0.025,
            0.02,
            &[("rage", 0.5), ("fear", 0.5), ("trust", -0.5)],
        ),
        SymbolicMapping::new(
            "unemployment",
            0.05,
            0.03,
            &[("despair", 1.0), ("fear", 0.5), ("hope", -0.5)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gdp() -> SymbolicMapping {
        SymbolicMapping::new("gdp_growth", 0.02, 0.03, &[("hope", 1.0), ("despair", -1.0)])
    }

    #[test]
    fn test_neutral_overlays_give_baseline() {
        let state = WorldState::with_default_overlays("t");
        assert!((gdp().expected_value(&state).unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_full_hope_gives_upper_bound() {
        let state = WorldState::new("t")
            .with_overlay("hope", 1.0)
            .and_then(|s| s.with_overlay("despair", 0.0))
            .unwrap();
        assert!((gdp().symbolic_pressure(&state).unwrap() - 1.0).abs() < 1e-12);
        assert!((gdp().expected_value(&state).unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_missing_overlay_is_gravity_error() {
        let state = WorldState::new("t").with_overlay("hope", 0.7).unwrap();
        let err = gdp().expected_value(&state).unwrap_err();
        assert!(matches!(err, PulseError::GravityCorrection { .. }));
    }

    #[test]
    fn test_implied_pressure_inverts_expected_value() {
        let state = WorldState::new("t")
            .with_overlay("hope", 0.7)
            .and_then(|s| s.with_overlay("despair", 0.4))
            .unwrap();
        let mapping = gdp();
        let pressure = mapping.symbolic_pressure(&state).unwrap();
        let value = mapping.expected_value(&state).unwrap();
        assert!((mapping.implied_pressure(value) - pressure).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_zero_sensitivity() {
        let mut mapping = gdp();
        mapping.sensitivity = 0.0;
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_default_mappings_are_valid() {
        for mapping in default_mappings() {
            mapping.validate().unwrap();
        }
    }
}
