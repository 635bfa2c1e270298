//! SymbolicGravityFabric - bounded correction toward symbolic expectations
//!
//! For each variable with a mapping:
//!
//! ```text
//! causal_delta   = value_after_rules - value_before_turn
//! expected_delta = symbolic_target   - value_before_turn
//! gravity_delta  = clamp(lambda * confidence * (expected_delta - causal_delta), -cap, cap)
//! ```
//!
//! Corrections under the noise floor are zeroed. The fabric only computes;
//! the Simulator applies the returned corrections to the state it owns.

use std::collections::{BTreeMap, VecDeque};

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::config::GravityConfig;
use crate::core::error::Result;
use crate::core::types::Turn;
use crate::gravity::thresholds::AdaptiveThresholds;
use crate::gravity::transform::SymbolicMapping;
use crate::world::state::WorldState;

/// One variable's correction for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityCorrection {
    pub variable: String,
    pub causal_delta: f64,
    pub gravity_delta: f64,
    /// Smoothed share of recent movement that came from gravity (0-1)
    pub cumulative_influence: f64,
}

/// Aggregates for the most recent turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GravityTurnMetrics {
    pub turn: Turn,
    pub corrected_variables: usize,
    pub total_abs_correction: f64,
    pub max_abs_correction: f64,
    pub mean_influence: f64,
    /// Variables that fell back to causal-only this turn
    pub fallbacks: usize,
}

#[derive(Debug, Clone)]
struct VariableTrack {
    confidence: f64,
    cumulative_influence: Option<f64>,
    recent: VecDeque<f64>,
}

#[derive(Debug, Clone)]
pub struct SymbolicGravityFabric {
    config: GravityConfig,
    mappings: Vec<SymbolicMapping>,
    tracks: AHashMap<String, VariableTrack>,
    thresholds: AdaptiveThresholds,
    enabled: bool,
    last_metrics: GravityTurnMetrics,
    total_abs_correction: f64,
    /// Variables already warned about, so a broken mapping logs once
    warned: AHashSet<String>,
}

impl SymbolicGravityFabric {
    /// Build the fabric; a missing or unreadable threshold file degrades to no caps
    pub fn new(config: &GravityConfig) -> Self {
        let thresholds = match &config.threshold_file {
            Some(path) if path.exists() => match AdaptiveThresholds::load(path) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not load gravity thresholds; using defaults");
                    AdaptiveThresholds::new()
                }
            },
            _ => AdaptiveThresholds::new(),
        };

        let mut mappings = config.mappings.clone();
        mappings.sort_by(|a, b| a.variable.cmp(&b.variable));
        mappings.dedup_by(|a, b| a.variable == b.variable);

        Self {
            config: config.clone(),
            mappings,
            tracks: AHashMap::new(),
            thresholds,
            enabled: config.enabled,
            last_metrics: GravityTurnMetrics::default(),
            total_abs_correction: 0.0,
            warned: AHashSet::new(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: AdaptiveThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn mappings(&self) -> &[SymbolicMapping] {
        &self.mappings
    }

    /// Compute this turn's corrections
    ///
    /// `pre_turn` holds the variables as they were before decay and rules.
    /// Returns an empty list when the fabric is disabled.
    pub fn compute_corrections(
        &mut self,
        turn: Turn,
        pre_turn: &BTreeMap<String, f64>,
        state: &WorldState,
    ) -> Vec<GravityCorrection> {
        let mut metrics = GravityTurnMetrics {
            turn,
            ..GravityTurnMetrics::default()
        };

        if !self.enabled {
            self.last_metrics = metrics;
            return Vec::new();
        }

        let mut corrections = Vec::with_capacity(self.mappings.len());
        for mapping in &self.mappings {
            let Some(current) = state.variable(&mapping.variable) else {
                continue;
            };
            let before = pre_turn.get(&mapping.variable).copied().unwrap_or(0.0);
            let causal_delta = current - before;

            let target = match mapping.expected_value(state) {
                Ok(target) => target,
                Err(e) => {
                    if self.warned.insert(mapping.variable.clone()) {
                        tracing::warn!(variable = %mapping.variable, error = %e, "Gravity falling back to causal-only delta");
                    } else {
                        tracing::debug!(variable = %mapping.variable, "Gravity fallback");
                    }
                    metrics.fallbacks += 1;
                    let influence = self
                        .tracks
                        .get(&mapping.variable)
                        .and_then(|t| t.cumulative_influence)
                        .unwrap_or(0.0);
                    corrections.push(GravityCorrection {
                        variable: mapping.variable.clone(),
                        causal_delta,
                        gravity_delta: 0.0,
                        cumulative_influence: influence,
                    });
                    continue;
                }
            };

            let cap = self
                .thresholds
                .get(&mapping.variable)
                .unwrap_or(self.config.max_step);
            let track = self
                .tracks
                .entry(mapping.variable.clone())
                .or_insert_with(|| VariableTrack {
                    confidence: self.config.base_confidence,
                    cumulative_influence: None,
                    recent: VecDeque::with_capacity(self.config.volatility_window),
                });

            let expected_delta = target - before;
            let weight = self.config.lambda * track.confidence;
            let mut gravity_delta = (weight * (expected_delta - causal_delta)).clamp(-cap, cap);
            if !gravity_delta.is_finite() || gravity_delta.abs() < self.config.noise_floor {
                gravity_delta = 0.0;
            }

            let ratio = gravity_delta.abs()
                / (causal_delta.abs() + gravity_delta.abs() + self.config.epsilon);
            let influence = match track.cumulative_influence {
                None => ratio,
                Some(prev) => {
                    self.config.influence_alpha * ratio + (1.0 - self.config.influence_alpha) * prev
                }
            };
            track.cumulative_influence = Some(influence);

            update_confidence(track, gravity_delta, &self.config);

            if self.config.adaptive_thresholds {
                self.thresholds
                    .observe(&mapping.variable, causal_delta.abs(), self.config.max_step);
            }

            metrics.total_abs_correction += gravity_delta.abs();
            metrics.max_abs_correction = metrics.max_abs_correction.max(gravity_delta.abs());
            if gravity_delta != 0.0 {
                metrics.corrected_variables += 1;
            }

            corrections.push(GravityCorrection {
                variable: mapping.variable.clone(),
                causal_delta,
                gravity_delta,
                cumulative_influence: influence,
            });
        }

        if !corrections.is_empty() {
            metrics.mean_influence = corrections
                .iter()
                .map(|c| c.cumulative_influence)
                .sum::<f64>()
                / corrections.len() as f64;
        }
        self.total_abs_correction += metrics.total_abs_correction;
        tracing::debug!(
            turn,
            corrected = metrics.corrected_variables,
            total = metrics.total_abs_correction,
            "Gravity corrections computed"
        );
        self.last_metrics = metrics;
        corrections
    }

    pub fn influence(&self, variable: &str) -> Option<f64> {
        self.tracks.get(variable).and_then(|t| t.cumulative_influence)
    }

    pub fn confidence(&self, variable: &str) -> Option<f64> {
        self.tracks.get(variable).map(|t| t.confidence)
    }

    /// Cumulative influence for every tracked variable
    pub fn influence_summary(&self) -> BTreeMap<String, f64> {
        self.tracks
            .iter()
            .filter_map(|(name, t)| t.cumulative_influence.map(|i| (name.clone(), i)))
            .collect()
    }

    pub fn last_metrics(&self) -> &GravityTurnMetrics {
        &self.last_metrics
    }

    /// Sum of absolute corrections over the fabric's lifetime
    pub fn total_abs_correction(&self) -> f64 {
        self.total_abs_correction
    }

    pub fn thresholds(&self) -> &AdaptiveThresholds {
        &self.thresholds
    }

    /// Write the current caps to the configured threshold file, if any
    pub fn save_thresholds(&self) -> Result<()> {
        if let Some(path) = &self.config.threshold_file {
            self.thresholds.save(path)?;
        }
        Ok(())
    }
}

/// Volatile recent corrections erode confidence; calm turns restore it
fn update_confidence(track: &mut VariableTrack, gravity_delta: f64, config: &GravityConfig) {
    track.recent.push_back(gravity_delta);
    while track.recent.len() > config.volatility_window {
        track.recent.pop_front();
    }
    if track.recent.len() < 2 {
        return;
    }

    let n = track.recent.len() as f64;
    let mean = track.recent.iter().sum::<f64>() / n;
    let variance = track.recent.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;

    track.confidence = if variance.sqrt() > config.volatility_threshold {
        (track.confidence * (1.0 - config.confidence_decay)).max(config.min_confidence)
    } else {
        (track.confidence + config.confidence_recovery).min(config.base_confidence)
    };
}
