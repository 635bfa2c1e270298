//! Overlay decay dynamics - per-turn fading of symbolic overlays

use std::collections::BTreeMap;

use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::world::mutation;
use crate::world::state::WorldState;

/// Decay rates for every overlay, with a fallback rate
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDynamics {
    pub default_rate: f64,
    pub overrides: BTreeMap<String, f64>,
}

impl Default for OverlayDynamics {
    fn default() -> Self {
        Self {
            default_rate: 0.01,
            overrides: BTreeMap::new(),
        }
    }
}

impl OverlayDynamics {
    pub fn new(default_rate: f64) -> Self {
        Self {
            default_rate,
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            default_rate: config.default_decay_rate,
            overrides: config.overlay_decay.clone(),
        }
    }

    pub fn rate_for(&self, overlay: &str) -> f64 {
        self.overrides
            .get(overlay)
            .copied()
            .unwrap_or(self.default_rate)
    }

    pub fn insert(&mut self, overlay: impl Into<String>, rate: f64) {
        self.overrides.insert(overlay.into(), rate);
    }

    /// Decay every overlay in the state by its configured rate
    pub fn apply(&self, state: &mut WorldState) -> Result<()> {
        let names: Vec<String> = state.overlays().keys().cloned().collect();
        for name in names {
            mutation::decay_overlay(state, &name, self.rate_for(&name))?;
        }
        Ok(())
    }
}
