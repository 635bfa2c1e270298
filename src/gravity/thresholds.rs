//! Adaptive per-variable correction caps, persisted as a JSON map

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Smoothing for the observed-movement average behind learned caps
const MOVEMENT_ALPHA: f64 = 0.1;

/// Learned caps are this multiple of typical causal movement
const CAP_MULTIPLIER: f64 = 2.0;

/// Learned caps never drop below this fraction of the global ceiling
const CAP_FLOOR_FRACTION: f64 = 0.1;

/// Per-variable correction caps
///
/// Serializes as a plain `{ "variable": cap }` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptiveThresholds {
    caps: BTreeMap<String, f64>,
    #[serde(skip)]
    movement: BTreeMap<String, f64>,
}

impl AdaptiveThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut thresholds: AdaptiveThresholds = serde_json::from_str(&content)?;
        thresholds.caps.retain(|_, cap| cap.is_finite() && *cap > 0.0);
        Ok(thresholds)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, variable: &str) -> Option<f64> {
        self.caps.get(variable).copied()
    }

    pub fn set(&mut self, variable: impl Into<String>, cap: f64) {
        if cap.is_finite() && cap > 0.0 {
            self.caps.insert(variable.into(), cap);
        }
    }

    pub fn caps(&self) -> &BTreeMap<String, f64> {
        &self.caps
    }

    /// Fold one turn's causal movement into the learned cap for `variable`
    pub fn observe(&mut self, variable: &str, causal_magnitude: f64, ceiling: f64) {
        if !causal_magnitude.is_finite() {
            return;
        }
        let avg = self
            .movement
            .entry(variable.to_string())
            .and_modify(|m| *m = MOVEMENT_ALPHA * causal_magnitude + (1.0 - MOVEMENT_ALPHA) * *m)
            .or_insert(causal_magnitude);
        let cap = (CAP_MULTIPLIER * *avg).clamp(ceiling * CAP_FLOOR_FRACTION, ceiling);
        self.caps.insert(variable.to_string(), cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_plain_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        let mut thresholds = AdaptiveThresholds::new();
        thresholds.set("gdp_growth", 0.01);
        thresholds.save(&path).unwrap();

        let raw: BTreeMap<String, f64> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("gdp_growth"), Some(&0.01));

        let loaded = AdaptiveThresholds::load(&path).unwrap();
        assert_eq!(loaded.get("gdp_growth"), Some(0.01));
    }

    #[test]
    fn test_load_drops_invalid_caps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        fs::write(&path, r#"{"a": 0.02, "b": -1.0}"#).unwrap();
        let loaded = AdaptiveThresholds::load(&path).unwrap();
        assert_eq!(loaded.get("a"), Some(0.02));
        assert_eq!(loaded.get("b"), None);
    }

    #[test]
    fn test_observe_bounds_cap() {
        let mut thresholds = AdaptiveThresholds::new();
        thresholds.observe("x", 1.0, 0.05);
        assert_eq!(thresholds.get("x"), Some(0.05));

        let mut quiet = AdaptiveThresholds::new();
        quiet.observe("x", 0.0, 0.05);
        assert!((quiet.get("x").unwrap() - 0.005).abs() < 1e-12);
    }
}
