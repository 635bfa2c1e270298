//! Simulator - the single-writer turn loop
//!
//! One turn runs, in order:
//! decay -> rule execution -> gravity correction -> shadow monitor ->
//! symbolic tagging -> trust enrichment -> TurnResult
//!
//! Only the Simulator mutates the live WorldState. The fabric, monitor,
//! tagger, and enricher see it through shared references and return values
//! that the Simulator applies.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::core::config::PulseConfig;
use crate::core::error::Result;
use crate::core::types::Turn;
use crate::gravity::fabric::{GravityCorrection, SymbolicGravityFabric};
use crate::gravity::shadow::{GravityOverrideTrigger, OverridePolicy, ShadowModelMonitor};
use crate::rules::causal_rules::{RuleContext, ShockRule};
use crate::rules::dynamics::OverlayDynamics;
use crate::rules::engine::RuleEngine;
use crate::rules::loader::RuleSet;
use crate::simulation::result::{TurnDeltas, TurnResult};
use crate::simulation::tagging::{tagger_from_name, SymbolicTagger};
use crate::simulation::trust::{InfluenceTrustEnricher, TrustEnricher};
use crate::world::mutation;
use crate::world::state::WorldState;

/// Largest offset chrono can represent in whole seconds
const MAX_OFFSET_SECS: i64 = i64::MAX / 1_000;

#[derive(Debug, Clone)]
pub struct Simulator {
    config: PulseConfig,
    rules: RuleEngine,
    dynamics: OverlayDynamics,
    fabric: SymbolicGravityFabric,
    monitor: Option<ShadowModelMonitor>,
    tagger: Option<Arc<dyn SymbolicTagger>>,
    trust: Option<Arc<dyn TrustEnricher>>,
    rng: ChaCha8Rng,
    origin: DateTime<Utc>,
    /// Caller-requested gravity switch
    gravity_enabled: bool,
    /// Set when the shadow monitor fired during this run
    gravity_override: Option<GravityOverrideTrigger>,
}

impl Simulator {
    /// Build a simulator with the built-in rule table
    ///
    /// Fails only on invalid configuration.
    pub fn new(config: &PulseConfig) -> Result<Self> {
        config.validate()?;

        let sim = &config.simulation;
        let mut rules = RuleEngine::with_default_rules();
        add_shock_rule(&mut rules, sim.shock_amplitude)?;

        let monitor = config
            .shadow_monitor
            .enabled
            .then(|| ShadowModelMonitor::new(&config.shadow_monitor));
        let tagger = sim.tagging_enabled.then(|| tagger_from_name(&sim.tagger));
        let trust: Option<Arc<dyn TrustEnricher>> = sim
            .trust_enabled
            .then(|| Arc::new(InfluenceTrustEnricher::default()) as Arc<dyn TrustEnricher>);

        tracing::debug!(
            seed = sim.seed,
            rules = rules.len(),
            gravity = config.gravity.enabled,
            monitor = monitor.is_some(),
            "Simulator built"
        );

        Ok(Self {
            config: config.clone(),
            rules,
            dynamics: OverlayDynamics::from_config(sim),
            fabric: SymbolicGravityFabric::new(&config.gravity),
            monitor,
            tagger,
            trust,
            rng: ChaCha8Rng::seed_from_u64(sim.seed),
            origin: sim.start_time.unwrap_or(DateTime::UNIX_EPOCH),
            gravity_enabled: config.gravity.enabled,
            gravity_override: None,
        })
    }

    /// Replace the rule engine wholesale
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    /// Replace rules (and decay rates, if given) with a loaded rule set
    ///
    /// The seeded shock rule is re-added when configured.
    pub fn with_rule_set(mut self, set: RuleSet) -> Result<Self> {
        let mut rules = RuleEngine::new();
        for rule in set.rules {
            rules.register(Arc::new(rule))?;
        }
        add_shock_rule(&mut rules, self.config.simulation.shock_amplitude)?;
        self.rules = rules;
        if let Some(dynamics) = set.overlay_decay {
            self.dynamics = dynamics;
        }
        Ok(self)
    }

    pub fn with_fabric(mut self, fabric: SymbolicGravityFabric) -> Self {
        self.gravity_enabled = fabric.is_enabled();
        self.fabric = fabric;
        self
    }

    pub fn with_tagger(mut self, tagger: Arc<dyn SymbolicTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_trust_enricher(mut self, enricher: Arc<dyn TrustEnricher>) -> Self {
        self.trust = Some(enricher);
        self
    }

    /// Run without the shadow monitor safety net
    pub fn without_monitor(mut self) -> Self {
        self.monitor = None;
        self
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn fabric(&self) -> &SymbolicGravityFabric {
        &self.fabric
    }

    pub fn monitor(&self) -> Option<&ShadowModelMonitor> {
        self.monitor.as_ref()
    }

    pub fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
        self.fabric.set_enabled(enabled && self.gravity_override.is_none());
    }

    /// Whether gravity will run on the next turn
    pub fn gravity_active(&self) -> bool {
        self.fabric.is_enabled()
    }

    /// Trigger that suspended gravity in this run, if any
    pub fn gravity_override(&self) -> Option<&GravityOverrideTrigger> {
        self.gravity_override.as_ref()
    }

    /// Lift a monitor-imposed suspension and clear monitor history
    pub fn clear_gravity_override(&mut self) {
        self.gravity_override = None;
        self.fabric.set_enabled(self.gravity_enabled);
        if let Some(monitor) = &mut self.monitor {
            monitor.reset();
        }
    }

    /// Restart the random source
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Simulated time at the end of `turn`
    pub fn timestamp_for(&self, turn: Turn) -> DateTime<Utc> {
        let secs = i64::try_from(turn)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.config.simulation.turn_duration_secs)
            .min(MAX_OFFSET_SECS);
        self.origin
            .checked_add_signed(Duration::seconds(secs))
            .unwrap_or(self.origin)
    }

    /// Advance `state` by one turn
    ///
    /// Substep failures are logged and recovered in place; the turn always
    /// completes and produces a result.
    pub fn simulate_turn(&mut self, state: &mut WorldState) -> TurnResult {
        let before = state.snapshot();
        let turn = state.turn + 1;

        // Decay
        if let Err(e) = self.dynamics.apply(state) {
            tracing::warn!(turn, error = %e, "Overlay decay failed; skipping");
        }

        // Rules
        let outcome = {
            let mut ctx = RuleContext {
                turn,
                rng: &mut self.rng,
            };
            self.rules.run_rules(state, &mut ctx)
        };

        // Gravity
        let gravity_ran = self.fabric.is_enabled();
        let corrections = self
            .fabric
            .compute_corrections(turn, before.variables(), state);
        apply_corrections(state, &corrections);

        // Shadow monitor
        let override_trigger = if gravity_ran {
            self.check_monitor(turn, &corrections)
        } else {
            None
        };
        if let Some(trigger) = &override_trigger {
            mutation::record_event(
                state,
                format!("turn {}: gravity override ({})", turn, trigger.reason()),
            );
        }

        state.turn = turn;
        let deltas = TurnDeltas::between(&before, state);

        // Tagging and trust
        let symbolic_tag = self.tagger.as_ref().and_then(|t| t.tag(state, &deltas));
        let trust_metadata = self
            .trust
            .as_ref()
            .and_then(|t| t.enrich(state, &corrections, symbolic_tag.as_ref()));

        tracing::debug!(
            turn,
            fired = outcome.fired.len(),
            failures = outcome.failures.len(),
            corrections = corrections.len(),
            "Turn complete"
        );

        TurnResult {
            turn,
            timestamp: self.timestamp_for(turn),
            overlays_snapshot: state.overlays().clone(),
            variables_snapshot: state.variables().clone(),
            deltas,
            symbolic_tag,
            trust_metadata,
            gravity_corrections: corrections,
            fired_rules: outcome.fired,
            override_trigger,
        }
    }

    /// Feed the monitor; on a trigger gravity is suspended for the rest of the run
    fn check_monitor(
        &mut self,
        turn: Turn,
        corrections: &[GravityCorrection],
    ) -> Option<GravityOverrideTrigger> {
        let monitor = self.monitor.as_mut()?;
        let trigger = match monitor.observe(turn, corrections) {
            Ok(trigger) => trigger?,
            Err(e) => {
                tracing::warn!(turn, error = %e, "Shadow monitor could not evaluate; continuing");
                return None;
            }
        };

        match monitor.policy() {
            OverridePolicy::DisableGravity => {
                tracing::warn!(turn, variable = %trigger.variable, "Disabling gravity for the rest of the run");
            }
            OverridePolicy::Abort => {
                tracing::warn!(turn, variable = %trigger.variable, "Gravity override requests abort");
            }
        }
        self.fabric.set_enabled(false);
        self.gravity_override = Some(trigger.clone());
        Some(trigger)
    }

    pub(crate) fn override_policy(&self) -> Option<OverridePolicy> {
        self.monitor.as_ref().map(|m| m.policy())
    }
}

fn add_shock_rule(rules: &mut RuleEngine, amplitude: f64) -> Result<()> {
    if let Some(shock) = ShockRule::new(amplitude) {
        rules.register(Arc::new(shock))?;
    }
    Ok(())
}

/// Apply gravity deltas; a rejected write leaves that variable causal-only
fn apply_corrections(state: &mut WorldState, corrections: &[GravityCorrection]) {
    for correction in corrections {
        if correction.gravity_delta == 0.0 {
            continue;
        }
        if let Err(e) = mutation::adjust_variable(state, &correction.variable, correction.gravity_delta)
        {
            tracing::warn!(variable = %correction.variable, error = %e, "Gravity correction rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> PulseConfig {
        let mut config = PulseConfig::default();
        config.simulation.start_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        config
    }

    fn economy() -> WorldState {
        WorldState::with_default_overlays("test")
            .with_variable("gdp_growth", 0.02)
            .and_then(|s| s.with_variable("unemployment", 0.05))
            .and_then(|s| s.with_variable("inflation", 0.03))
            .and_then(|s| s.with_variable("interest_rate", 0.04))
            .unwrap()
    }

    #[test]
    fn test_turn_advances_counter_and_time() {
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();

        let result = sim.simulate_turn(&mut state);

        assert_eq!(result.turn, 1);
        assert_eq!(state.turn, 1);
        assert_eq!(
            result.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_default_origin_is_fixed() {
        let sim = Simulator::new(&PulseConfig::default()).unwrap();
        assert_eq!(sim.timestamp_for(0), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(
            sim.timestamp_for(2),
            Utc.with_ymd_and_hms(1970, 1, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_decay_runs_before_rules() {
        let mut cfg = config();
        cfg.simulation.default_decay_rate = 0.1;
        let mut sim = Simulator::new(&cfg)
            .unwrap()
            .with_rules(RuleEngine::new());
        let mut state = WorldState::new("t").with_overlay("hope", 0.5).unwrap();

        let result = sim.simulate_turn(&mut state);

        assert!((state.overlay("hope").unwrap() - 0.45).abs() < 1e-12);
        assert!((result.deltas.overlays["hope"] + 0.05).abs() < 1e-12);
        assert!(result.fired_rules.is_empty());
    }

    #[test]
    fn test_gravity_disabled_gives_no_corrections() {
        let mut cfg = config();
        cfg.gravity.enabled = false;
        let mut sim = Simulator::new(&cfg).unwrap();
        let mut state = economy();

        for _ in 0..5 {
            let result = sim.simulate_turn(&mut state);
            assert!(result.gravity_corrections.iter().all(|c| c.gravity_delta == 0.0));
            assert!(result.override_trigger.is_none());
        }
    }

    #[test]
    fn test_corrections_are_applied_to_state() {
        let mut cfg = config();
        cfg.simulation.default_decay_rate = 0.0;
        let mut sim = Simulator::new(&cfg)
            .unwrap()
            .with_rules(RuleEngine::new())
            .without_monitor();
        let mut state = WorldState::with_default_overlays("t")
            .with_variable("gdp_growth", 0.0)
            .unwrap();

        let result = sim.simulate_turn(&mut state);

        let c = result.correction_for("gdp_growth").unwrap();
        // neutral overlays -> target 0.02, lambda 0.25 -> 0.005
        assert!((c.gravity_delta - 0.005).abs() < 1e-12);
        assert!((state.variable("gdp_growth").unwrap() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_monitor_disables_gravity_on_trigger() {
        let mut cfg = config();
        cfg.simulation.default_decay_rate = 0.0;
        cfg.shadow_monitor.window_steps = 2;
        cfg.shadow_monitor.critical_variables = vec!["gdp_growth".to_string()];
        let mut sim = Simulator::new(&cfg).unwrap().with_rules(RuleEngine::new());
        let mut state = WorldState::with_default_overlays("t")
            .with_variable("gdp_growth", -1.0)
            .unwrap();

        // Pure gravity movement: variance explained is 1.0 once the window fills
        sim.simulate_turn(&mut state);
        let second = sim.simulate_turn(&mut state);
        assert!(second.override_trigger.is_some());
        assert!(!sim.gravity_active());

        let third = sim.simulate_turn(&mut state);
        assert!(third.gravity_corrections.is_empty());
        assert!(third.override_trigger.is_none());

        sim.clear_gravity_override();
        assert!(sim.gravity_active());
    }

    #[test]
    fn test_tagging_and_trust_are_optional() {
        let mut cfg = config();
        cfg.simulation.tagging_enabled = false;
        cfg.simulation.trust_enabled = false;
        let mut sim = Simulator::new(&cfg).unwrap();
        let mut state = economy();

        let result = sim.simulate_turn(&mut state);
        assert!(result.symbolic_tag.is_none());
        assert!(result.trust_metadata.is_none());

        let mut sim = Simulator::new(&config()).unwrap();
        let result = sim.simulate_turn(&mut economy());
        assert!(result.symbolic_tag.is_some());
        assert!(result.trust_metadata.is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = config();
        cfg.gravity.max_step = 0.0;
        assert!(Simulator::new(&cfg).is_err());
    }

    #[test]
    fn test_shock_rule_registered_when_configured() {
        let mut cfg = config();
        cfg.simulation.shock_amplitude = 0.01;
        let sim = Simulator::new(&cfg).unwrap();
        assert!(sim.rules().rule_ids().contains(&ShockRule::ID));
        assert_eq!(sim.rules().rule_ids().last(), Some(&ShockRule::ID));
    }
}
