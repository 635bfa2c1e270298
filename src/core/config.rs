//! Kernel configuration with documented defaults
//!
//! All tunables are collected here with explanations of their purpose and
//! how they interact with each other. A `PulseConfig` is built once at
//! startup (defaults, or a TOML file) and passed by reference into the
//! Simulator, the gravity fabric, and the regime/retrodiction pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{PulseError, Result};
use crate::gravity::shadow::OverridePolicy;
use crate::gravity::transform::{default_mappings, SymbolicMapping};
use crate::retrodiction::trigger::{CooldownScope, CooldownWindow};

/// Top-level configuration for the kernel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub simulation: SimulationConfig,
    pub gravity: GravityConfig,
    pub shadow_monitor: ShadowMonitorConfig,
    pub regime: RegimeConfig,
    pub retrodiction: RetrodictionConfig,
    pub storage: StorageConfig,
}

// ============================================================================
// Turn loop
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the turn loop's random source
    ///
    /// Two runs with the same seed, rules, and initial state produce
    /// identical TurnResult sequences.
    pub seed: u64,

    /// Fraction of each overlay lost per turn when no override exists
    ///
    /// At 0.01 an untouched overlay halves in roughly 70 turns.
    pub default_decay_rate: f64,

    /// Per-overlay decay overrides (overlay name -> rate)
    pub overlay_decay: BTreeMap<String, f64>,

    /// Attach a symbolic tag to each TurnResult
    pub tagging_enabled: bool,

    /// Registered tagger name ("heuristic" or "trend")
    ///
    /// Unknown names fall back to the heuristic tagger with a warning.
    pub tagger: String,

    /// Attach trust metadata to each TurnResult
    pub trust_enabled: bool,

    /// Simulated time of turn 0
    ///
    /// Unset means the Unix epoch, so timestamps follow only from the
    /// config and the turn number.
    pub start_time: Option<DateTime<Utc>>,

    /// Simulated seconds per turn (one day by default)
    pub turn_duration_secs: i64,

    /// Amplitude of the seeded per-turn shock applied to every variable
    ///
    /// 0.0 disables the shock rule entirely.
    pub shock_amplitude: f64,

    /// Write a checkpoint every N turns when checkpointing is requested
    pub checkpoint_every: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            default_decay_rate: 0.01,
            overlay_decay: BTreeMap::new(),
            tagging_enabled: true,
            tagger: "heuristic".to_string(),
            trust_enabled: true,
            start_time: None,
            turn_duration_secs: 86_400,
            shock_amplitude: 0.0,
            checkpoint_every: 1,
        }
    }
}

// ============================================================================
// Symbolic gravity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Master switch; false short-circuits the fabric to zero corrections
    pub enabled: bool,

    /// Correction weight ("lambda") applied to the expected-vs-actual gap
    ///
    /// Scaled further by each mapping's confidence. At 0.25 a variable
    /// closes a quarter of its gap to the symbolic target per turn, before
    /// the step cap is applied.
    pub lambda: f64,

    /// Largest absolute correction applied to one variable in one turn
    pub max_step: f64,

    /// Corrections smaller than this are treated as zero
    pub noise_floor: f64,

    /// Smoothing factor for the cumulative influence ratio (0-1)
    pub influence_alpha: f64,

    /// Denominator guard for the influence ratio
    pub epsilon: f64,

    /// Confidence a mapping starts with
    pub base_confidence: f64,

    /// Floor for decayed confidence
    pub min_confidence: f64,

    /// Multiplicative confidence loss per volatile turn
    pub confidence_decay: f64,

    /// Additive confidence regained per calm turn (up to base_confidence)
    pub confidence_recovery: f64,

    /// Number of recent corrections used to measure volatility
    pub volatility_window: usize,

    /// Standard deviation of recent corrections above which a turn is volatile
    pub volatility_threshold: f64,

    /// Learn per-variable caps from observed causal movement
    pub adaptive_thresholds: bool,

    /// JSON file holding per-variable caps (loaded at startup, saved on request)
    pub threshold_file: Option<PathBuf>,

    /// Numeric <-> symbolic mappings, one per corrected variable
    pub mappings: Vec<SymbolicMapping>,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lambda: 0.25,
            max_step: 0.05,
            noise_floor: 1e-6,
            influence_alpha: 0.2,
            epsilon: 1e-9,
            base_confidence: 1.0,
            min_confidence: 0.2,
            confidence_decay: 0.1,
            confidence_recovery: 0.02,
            volatility_window: 5,
            volatility_threshold: 0.02,
            adaptive_thresholds: false,
            threshold_file: None,
            mappings: default_mappings(),
        }
    }
}

// ============================================================================
// Shadow model monitor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowMonitorConfig {
    /// Build the monitor at all; false runs without the safety net
    pub enabled: bool,

    /// Share of a critical variable's movement attributable to gravity
    /// above which the monitor fires
    pub threshold_variance_explained: f64,

    /// Rolling window length in turns
    pub window_steps: usize,

    /// Variables whose trajectories are watched
    pub critical_variables: Vec<String>,

    /// What the Simulator does when the monitor fires
    pub on_trigger: OverridePolicy,
}

impl Default for ShadowMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_variance_explained: 0.6,
            window_steps: 10,
            critical_variables: vec![
                "gdp_growth".to_string(),
                "unemployment".to_string(),
                "inflation".to_string(),
            ],
            on_trigger: OverridePolicy::DisableGravity,
        }
    }
}

// ============================================================================
// Regime detection
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Confidence a non-default regime must exceed to emit a change event
    pub change_threshold: f64,

    /// Confidence at which the detector enters CandidateShift
    pub candidate_threshold: f64,

    /// Confidence below which the prevailing regime relaxes back to Normal
    pub exit_threshold: f64,

    /// Lead a challenger needs over the prevailing regime's confidence
    ///
    /// Regimes that share signals (tightening and inflation surge both read
    /// rising rates and prices) move together; without a margin the detector
    /// would flip between them on every ingest.
    pub switch_margin: f64,

    /// Smoothing factor for indicator momentum and news evidence (0-1)
    ///
    /// Higher reacts faster. At 0.3 a steadily rising series needs about
    /// six consecutive rises to push momentum past 0.87.
    pub smoothing: f64,

    /// Observations required before any change can be emitted
    pub min_observations: u64,

    /// Weight of news evidence relative to indicator evidence
    pub news_weight: f64,

    /// Changes smaller than this count as "flat"
    pub change_epsilon: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            change_threshold: 0.7,
            candidate_threshold: 0.4,
            exit_threshold: 0.2,
            switch_margin: 0.1,
            smoothing: 0.3,
            min_observations: 3,
            news_weight: 0.3,
            change_epsilon: 1e-9,
        }
    }
}

// ============================================================================
// Retrodiction
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrodictionConfig {
    /// Minimum spacing between snapshots of the same cause
    pub cooldown: CooldownWindow,

    /// Whether different regime types share one cooldown or have their own
    pub cooldown_scope: CooldownScope,

    /// Emit a PERIODIC snapshot every N turns (unset disables)
    pub periodic_interval_turns: Option<u64>,

    /// Turns each counterfactual scenario is simulated for
    pub scenario_turns: u64,

    /// Execute a snapshot's scenarios on the rayon pool
    pub parallel_scenarios: bool,
}

impl Default for RetrodictionConfig {
    fn default() -> Self {
        Self {
            cooldown: CooldownWindow::Seconds { seconds: 3600 },
            cooldown_scope: CooldownScope::PerCause,
            periodic_interval_turns: None,
            scenario_turns: 5,
            parallel_scenarios: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `snapshot_results_{id}.json` files
    pub directory: PathBuf,

    /// Reports buffered for the writer thread before submissions are dropped
    pub writer_queue_capacity: usize,

    /// Extra attempts after a failed write
    pub write_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("retrodiction_results"),
            writer_queue_capacity: 64,
            write_retries: 2,
        }
    }
}

// ============================================================================
// Loading and validation
// ============================================================================

impl PulseConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PulseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PulseError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.default_decay_rate) {
            return Err(invalid(format!(
                "simulation.default_decay_rate ({}) must be within [0, 1]",
                sim.default_decay_rate
            )));
        }
        for (overlay, rate) in &sim.overlay_decay {
            if !(0.0..=1.0).contains(rate) {
                return Err(invalid(format!(
                    "simulation.overlay_decay.{} ({}) must be within [0, 1]",
                    overlay, rate
                )));
            }
        }
        if sim.turn_duration_secs <= 0 {
            return Err(invalid("simulation.turn_duration_secs must be positive"));
        }
        if !sim.shock_amplitude.is_finite() || sim.shock_amplitude < 0.0 {
            return Err(invalid("simulation.shock_amplitude must be finite and >= 0"));
        }
        if sim.checkpoint_every == 0 {
            return Err(invalid("simulation.checkpoint_every must be at least 1"));
        }

        let g = &self.gravity;
        if !g.lambda.is_finite() || g.lambda < 0.0 {
            return Err(invalid("gravity.lambda must be finite and >= 0"));
        }
        if !g.max_step.is_finite() || g.max_step <= 0.0 {
            return Err(invalid("gravity.max_step must be positive"));
        }
        if !(0.0..=1.0).contains(&g.influence_alpha) || g.influence_alpha == 0.0 {
            return Err(invalid("gravity.influence_alpha must be within (0, 1]"));
        }
        if g.min_confidence > g.base_confidence {
            return Err(invalid(format!(
                "gravity.min_confidence ({}) should be <= base_confidence ({})",
                g.min_confidence, g.base_confidence
            )));
        }
        if g.volatility_window < 2 {
            return Err(invalid("gravity.volatility_window must be at least 2"));
        }
        for mapping in &g.mappings {
            mapping.validate()?;
        }

        let m = &self.shadow_monitor;
        if !(0.0..=1.0).contains(&m.threshold_variance_explained) {
            return Err(invalid(
                "shadow_monitor.threshold_variance_explained must be within [0, 1]",
            ));
        }
        if m.window_steps == 0 {
            return Err(invalid("shadow_monitor.window_steps must be at least 1"));
        }

        let r = &self.regime;
        for (name, value) in [
            ("change_threshold", r.change_threshold),
            ("candidate_threshold", r.candidate_threshold),
            ("exit_threshold", r.exit_threshold),
            ("switch_margin", r.switch_margin),
            ("smoothing", r.smoothing),
            ("news_weight", r.news_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("regime.{} ({}) must be within [0, 1]", name, value)));
            }
        }
        if r.candidate_threshold >= r.change_threshold {
            return Err(invalid(format!(
                "regime.candidate_threshold ({}) should be < change_threshold ({})",
                r.candidate_threshold, r.change_threshold
            )));
        }
        if r.exit_threshold >= r.candidate_threshold {
            return Err(invalid(format!(
                "regime.exit_threshold ({}) should be < candidate_threshold ({})",
                r.exit_threshold, r.candidate_threshold
            )));
        }

        if self.retrodiction.scenario_turns == 0 {
            return Err(invalid("retrodiction.scenario_turns must be at least 1"));
        }
        if self.retrodiction.periodic_interval_turns == Some(0) {
            return Err(invalid("retrodiction.periodic_interval_turns must be at least 1"));
        }
        if self.storage.writer_queue_capacity == 0 {
            return Err(invalid("storage.writer_queue_capacity must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> PulseError {
    PulseError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PulseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PulseConfig::from_toml_str(
            r#"
            [gravity]
            lambda = 0.5

            [shadow_monitor]
            window_steps = 4
            on_trigger = "abort"
            "#,
        )
        .unwrap();

        assert_eq!(config.gravity.lambda, 0.5);
        assert_eq!(config.gravity.max_step, 0.05);
        assert_eq!(config.shadow_monitor.window_steps, 4);
        assert_eq!(config.shadow_monitor.on_trigger, OverridePolicy::Abort);
        assert_eq!(config.simulation.seed, 12345);
    }

    #[test]
    fn test_cooldown_window_from_toml() {
        let config = PulseConfig::from_toml_str(
            r#"
            [retrodiction]
            cooldown = { kind = "turns", turns = 3 }
            cooldown_scope = "per_regime_type"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrodiction.cooldown, CooldownWindow::Turns { turns: 3 });
        assert_eq!(config.retrodiction.cooldown_scope, CooldownScope::PerRegimeType);
    }

    #[test]
    fn test_threshold_ordering_rejected() {
        let mut config = PulseConfig::default();
        config.regime.candidate_threshold = 0.8;
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("candidate_threshold"));
    }

    #[test]
    fn test_negative_step_cap_rejected() {
        let mut config = PulseConfig::default();
        config.gravity.max_step = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let result = PulseConfig::from_toml_str("[gravity\nlambda = ");
        assert!(matches!(result, Err(PulseError::TomlError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PulseConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(PulseError::InvalidConfig(_))));
    }
}
