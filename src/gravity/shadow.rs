//! ShadowModelMonitor - detects when gravity dominates the causal signal
//!
//! For each critical variable the monitor keeps the last `window_steps`
//! (causal, gravity) delta pairs. Once the window is full, the share of
//! movement explained by gravity is
//!
//! ```text
//! sum(g^2) / (sum(c^2) + sum(g^2))
//! ```
//!
//! and the monitor fires when it exceeds `threshold_variance_explained`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::config::ShadowMonitorConfig;
use crate::core::error::{PulseError, Result};
use crate::core::types::Turn;
use crate::gravity::fabric::GravityCorrection;

/// What the Simulator does when the monitor fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// Turn gravity off for the rest of the run and keep simulating
    #[default]
    DisableGravity,
    /// Stop the run and report why
    Abort,
}

/// Raised when gravity explains too much of a critical variable's movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityOverrideTrigger {
    pub turn: Turn,
    pub variable: String,
    pub variance_explained: f64,
    /// Mean cumulative-influence ratio across the window
    pub mean_influence: f64,
    pub window_steps: usize,
    pub threshold: f64,
}

impl GravityOverrideTrigger {
    pub fn reason(&self) -> String {
        format!(
            "gravity explained {:.1}% of '{}' movement over {} turns (threshold {:.1}%)",
            self.variance_explained * 100.0,
            self.variable,
            self.window_steps,
            self.threshold * 100.0
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    causal: f64,
    gravity: f64,
    influence: f64,
}

#[derive(Debug, Clone)]
pub struct ShadowModelMonitor {
    threshold: f64,
    window_steps: usize,
    policy: OverridePolicy,
    windows: BTreeMap<String, VecDeque<WindowEntry>>,
}

impl ShadowModelMonitor {
    pub fn new(config: &ShadowMonitorConfig) -> Self {
        let windows = config
            .critical_variables
            .iter()
            .map(|v| (v.clone(), VecDeque::with_capacity(config.window_steps)))
            .collect();
        Self {
            threshold: config.threshold_variance_explained,
            window_steps: config.window_steps.max(1),
            policy: config.on_trigger,
            windows,
        }
    }

    pub fn policy(&self) -> OverridePolicy {
        self.policy
    }

    pub fn critical_variables(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    /// Record one turn's corrections and check every critical variable
    ///
    /// Returns the first variable (by name) over threshold. Non-finite
    /// window contents are reported as `MonitorTrigger` errors.
    pub fn observe(
        &mut self,
        turn: Turn,
        corrections: &[GravityCorrection],
    ) -> Result<Option<GravityOverrideTrigger>> {
        for correction in corrections {
            let Some(window) = self.windows.get_mut(&correction.variable) else {
                continue;
            };
            window.push_back(WindowEntry {
                causal: correction.causal_delta,
                gravity: correction.gravity_delta,
                influence: correction.cumulative_influence,
            });
            while window.len() > self.window_steps {
                window.pop_front();
            }
        }

        for (variable, window) in &self.windows {
            if window.len() < self.window_steps {
                continue;
            }
            let explained = window_variance_explained(window).ok_or_else(|| {
                PulseError::MonitorTrigger(format!(
                    "non-finite correction history for '{}'",
                    variable
                ))
            })?;
            if explained > self.threshold {
                let mean_influence =
                    window.iter().map(|e| e.influence).sum::<f64>() / window.len() as f64;
                let trigger = GravityOverrideTrigger {
                    turn,
                    variable: variable.clone(),
                    variance_explained: explained,
                    mean_influence,
                    window_steps: self.window_steps,
                    threshold: self.threshold,
                };
                tracing::warn!(turn, variable = %variable, explained, "Gravity override triggered");
                return Ok(Some(trigger));
            }
        }
        Ok(None)
    }

    /// Current share explained for `variable`, once its window is full
    pub fn variance_explained(&self, variable: &str) -> Option<f64> {
        let window = self.windows.get(variable)?;
        if window.len() < self.window_steps {
            return None;
        }
        window_variance_explained(window)
    }

    /// Forget all history
    pub fn reset(&mut self) {
        for window in self.windows.values_mut() {
            window.clear();
        }
    }
}

fn window_variance_explained(window: &VecDeque<WindowEntry>) -> Option<f64> {
    let causal: f64 = window.iter().map(|e| e.causal * e.causal).sum();
    let gravity: f64 = window.iter().map(|e| e.gravity * e.gravity).sum();
    if !causal.is_finite() || !gravity.is_finite() {
        return None;
    }
    let total = causal + gravity;
    if total == 0.0 {
        return Some(0.0);
    }
    Some(gravity / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window: usize) -> ShadowMonitorConfig {
        ShadowMonitorConfig {
            window_steps: window,
            critical_variables: vec!["gdp_growth".to_string()],
            ..ShadowMonitorConfig::default()
        }
    }

    fn correction(causal: f64, gravity: f64) -> GravityCorrection {
        GravityCorrection {
            variable: "gdp_growth".to_string(),
            causal_delta: causal,
            gravity_delta: gravity,
            cumulative_influence: 0.5,
        }
    }

    #[test]
    fn test_needs_full_window() {
        let mut monitor = ShadowModelMonitor::new(&config(3));
        assert!(monitor.observe(1, &[correction(0.0, 0.01)]).unwrap().is_none());
        assert!(monitor.observe(2, &[correction(0.0, 0.01)]).unwrap().is_none());
        let trigger = monitor.observe(3, &[correction(0.0, 0.01)]).unwrap().unwrap();
        assert_eq!(trigger.variable, "gdp_growth");
        assert_eq!(trigger.turn, 3);
        assert!((trigger.variance_explained - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_causal_dominated_window_is_quiet() {
        let mut monitor = ShadowModelMonitor::new(&config(2));
        monitor.observe(1, &[correction(0.1, 0.01)]).unwrap();
        assert!(monitor.observe(2, &[correction(0.1, 0.01)]).unwrap().is_none());
        assert!(monitor.variance_explained("gdp_growth").unwrap() < 0.02);
    }

    #[test]
    fn test_non_critical_variables_ignored() {
        let mut monitor = ShadowModelMonitor::new(&config(1));
        let mut other = correction(0.0, 0.05);
        other.variable = "inflation".to_string();
        assert!(monitor.observe(1, &[other]).unwrap().is_none());
    }

    #[test]
    fn test_empty_corrections_never_trigger() {
        let mut monitor = ShadowModelMonitor::new(&config(1));
        for turn in 1..20 {
            assert!(monitor.observe(turn, &[]).unwrap().is_none());
        }
    }

    #[test]
    fn test_non_finite_history_is_error() {
        let mut monitor = ShadowModelMonitor::new(&config(1));
        let err = monitor.observe(1, &[correction(f64::NAN, 0.0)]).unwrap_err();
        assert!(matches!(err, PulseError::MonitorTrigger(_)));
    }

    #[test]
    fn test_reset_clears_windows() {
        let mut monitor = ShadowModelMonitor::new(&config(1));
        monitor.observe(1, &[correction(0.0, 0.01)]).unwrap();
        monitor.reset();
        assert!(monitor.variance_explained("gdp_growth").is_none());
    }
}
