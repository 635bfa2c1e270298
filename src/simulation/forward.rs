//! simulate_forward - the N-turn loop with checkpoints and early exit

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::gravity::shadow::{GravityOverrideTrigger, OverridePolicy};
use crate::simulation::result::TurnResult;
use crate::simulation::turn::Simulator;
use crate::world::checkpoint;
use crate::world::state::WorldState;

/// Knobs for one forward run
#[derive(Debug, Clone, Default)]
pub struct ForwardOptions {
    /// Write `{prefix}_turn_{n}.json` checkpoints when set
    pub checkpoint_prefix: Option<PathBuf>,
    /// Checkpoint cadence in turns; falls back to `simulation.checkpoint_every`
    pub checkpoint_every: Option<u64>,
    /// Checked before every turn; setting it stops the run at the next boundary
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ForwardOptions {
    pub fn with_checkpoints(prefix: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    Completed,
    Cancelled,
    Aborted { reason: String },
}

/// Everything a forward run produced, including partial runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub results: Vec<TurnResult>,
    pub stop: StopReason,
    pub triggers: Vec<GravityOverrideTrigger>,
    pub checkpoints: Vec<PathBuf>,
    /// Cumulative gravity influence per variable at the end of the run
    pub influence: BTreeMap<String, f64>,
}

impl SimulationRun {
    pub fn turns_completed(&self) -> usize {
        self.results.len()
    }

    pub fn last(&self) -> Option<&TurnResult> {
        self.results.last()
    }
}

impl Simulator {
    /// Advance `state` by up to `turns` turns
    ///
    /// Any gravity suspension left over from a previous run is lifted first.
    /// The run stops early when cancelled or when the shadow monitor fires
    /// under the `Abort` policy; results produced so far are always returned.
    pub fn simulate_forward(
        &mut self,
        state: &mut WorldState,
        turns: u64,
        options: &ForwardOptions,
    ) -> SimulationRun {
        self.clear_gravity_override();
        let every = options
            .checkpoint_every
            .unwrap_or(self.config().simulation.checkpoint_every)
            .max(1);

        let mut run = SimulationRun {
            results: Vec::with_capacity(turns as usize),
            stop: StopReason::Completed,
            triggers: Vec::new(),
            checkpoints: Vec::new(),
            influence: BTreeMap::new(),
        };

        tracing::info!(sim_id = %state.sim_id, start_turn = state.turn, turns, "Forward simulation starting");

        for _ in 0..turns {
            if options.cancelled() {
                tracing::info!(turn = state.turn, "Forward simulation cancelled");
                run.stop = StopReason::Cancelled;
                break;
            }

            let result = self.simulate_turn(state);
            let trigger = result.override_trigger.clone();
            run.results.push(result);

            if let Some(prefix) = &options.checkpoint_prefix {
                if state.turn % every == 0 {
                    match checkpoint::save_checkpoint(state, prefix) {
                        Ok(path) => run.checkpoints.push(path),
                        Err(e) => {
                            tracing::warn!(turn = state.turn, error = %e, "Checkpoint failed; continuing")
                        }
                    }
                }
            }

            if let Some(trigger) = trigger {
                let abort = self.override_policy() == Some(OverridePolicy::Abort);
                let reason = trigger.reason();
                run.triggers.push(trigger);
                if abort {
                    tracing::warn!(turn = state.turn, %reason, "Forward simulation aborted");
                    run.stop = StopReason::Aborted { reason };
                    break;
                }
            }
        }

        run.influence = self.fabric().influence_summary();
        tracing::info!(
            turns = run.results.len(),
            stop = ?run.stop,
            checkpoints = run.checkpoints.len(),
            "Forward simulation finished"
        );
        run
    }

    /// Load a checkpoint and continue from it
    ///
    /// A missing or invalid checkpoint is returned as an error.
    pub fn resume_forward(
        &mut self,
        checkpoint_file: &Path,
        turns: u64,
        options: &ForwardOptions,
    ) -> Result<(WorldState, SimulationRun)> {
        let mut state = checkpoint::load_checkpoint(checkpoint_file)?;
        tracing::info!(path = %checkpoint_file.display(), turn = state.turn, "Resuming from checkpoint");
        let run = self.simulate_forward(&mut state, turns, options);
        Ok((state, run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PulseConfig;
    use crate::rules::engine::RuleEngine;
    use chrono::{TimeZone, Utc};

    fn config() -> PulseConfig {
        let mut config = PulseConfig::default();
        config.simulation.start_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        config
    }

    fn economy() -> WorldState {
        WorldState::with_default_overlays("forward")
            .with_variable("gdp_growth", 0.02)
            .and_then(|s| s.with_variable("unemployment", 0.05))
            .and_then(|s| s.with_variable("inflation", 0.03))
            .unwrap()
    }

    #[test]
    fn test_runs_requested_turns() {
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();

        let run = sim.simulate_forward(&mut state, 7, &ForwardOptions::default());

        assert_eq!(run.turns_completed(), 7);
        assert_eq!(run.stop, StopReason::Completed);
        assert_eq!(state.turn, 7);
        let turns: Vec<u64> = run.results.iter().map(|r| r.turn).collect();
        assert_eq!(turns, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_checkpoints_on_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();
        let options = ForwardOptions {
            checkpoint_every: Some(2),
            ..ForwardOptions::with_checkpoints(&prefix)
        };

        let run = sim.simulate_forward(&mut state, 5, &options);

        assert_eq!(run.checkpoints.len(), 2);
        assert!(run.checkpoints[0].ends_with("run_turn_2.json"));
        assert!(run.checkpoints[1].exists());
    }

    #[test]
    fn test_checkpoint_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();

        // Parent of the prefix is a regular file, so every write fails
        let options = ForwardOptions::with_checkpoints(blocker.join("run"));
        let run = sim.simulate_forward(&mut state, 3, &options);

        assert_eq!(run.turns_completed(), 3);
        assert!(run.checkpoints.is_empty());
    }

    #[test]
    fn test_cancel_before_start() {
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();
        let options = ForwardOptions {
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..ForwardOptions::default()
        };

        let run = sim.simulate_forward(&mut state, 10, &options);

        assert_eq!(run.stop, StopReason::Cancelled);
        assert!(run.results.is_empty());
        assert_eq!(state.turn, 0);
    }

    #[test]
    fn test_abort_policy_stops_run() {
        let mut cfg = config();
        cfg.simulation.default_decay_rate = 0.0;
        cfg.shadow_monitor.window_steps = 2;
        cfg.shadow_monitor.critical_variables = vec!["gdp_growth".to_string()];
        cfg.shadow_monitor.on_trigger = OverridePolicy::Abort;
        let mut sim = Simulator::new(&cfg).unwrap().with_rules(RuleEngine::new());
        let mut state = WorldState::with_default_overlays("t")
            .with_variable("gdp_growth", -1.0)
            .unwrap();

        let run = sim.simulate_forward(&mut state, 10, &ForwardOptions::default());

        assert_eq!(run.turns_completed(), 2);
        assert!(matches!(run.stop, StopReason::Aborted { .. }));
        assert_eq!(run.triggers.len(), 1);
    }

    #[test]
    fn test_disable_policy_keeps_running() {
        let mut cfg = config();
        cfg.simulation.default_decay_rate = 0.0;
        cfg.shadow_monitor.window_steps = 2;
        cfg.shadow_monitor.critical_variables = vec!["gdp_growth".to_string()];
        let mut sim = Simulator::new(&cfg).unwrap().with_rules(RuleEngine::new());
        let mut state = WorldState::with_default_overlays("t")
            .with_variable("gdp_growth", -1.0)
            .unwrap();

        let run = sim.simulate_forward(&mut state, 6, &ForwardOptions::default());

        assert_eq!(run.turns_completed(), 6);
        assert_eq!(run.stop, StopReason::Completed);
        assert_eq!(run.triggers.len(), 1);
        assert!(run.results[2..].iter().all(|r| r.gravity_corrections.is_empty()));

        // A new run starts with gravity restored
        let again = sim.simulate_forward(&mut state, 1, &ForwardOptions::default());
        assert!(!again.results[0].gravity_corrections.is_empty());
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("resume");
        let mut sim = Simulator::new(&config()).unwrap();
        let mut state = economy();
        let run = sim.simulate_forward(&mut state, 3, &ForwardOptions::with_checkpoints(&prefix));

        let mut resumed = Simulator::new(&config()).unwrap();
        let (state, more) = resumed
            .resume_forward(&run.checkpoints[2], 2, &ForwardOptions::default())
            .unwrap();

        assert_eq!(state.turn, 5);
        assert_eq!(more.results[0].turn, 4);
    }

    #[test]
    fn test_resume_missing_checkpoint_is_error() {
        let mut sim = Simulator::new(&config()).unwrap();
        assert!(sim
            .resume_forward(Path::new("/no/such/run_turn_1.json"), 1, &ForwardOptions::default())
            .is_err());
    }
}
