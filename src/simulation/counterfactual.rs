//! simulate_counterfactual - base vs. intervention-forked runs
//!
//! The initial state is deep-copied twice and the Simulator cloned twice,
//! so the two runs share nothing mutable and run in parallel on rayon.
//! Both carry the same seed, rules, and turn count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::Turn;
use crate::simulation::result::{map_diff, TurnResult};
use crate::simulation::turn::Simulator;
use crate::world::mutation;
use crate::world::state::WorldState;

/// A what-if change applied to the forked run before turn 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Intervention {
    Set(f64),
    Delta(f64),
}

/// Fork minus base over the union of names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DivergenceRecord {
    pub turn: Turn,
    pub overlays: BTreeMap<String, f64>,
    pub variables: BTreeMap<String, f64>,
}

impl DivergenceRecord {
    fn between(turn: Turn, base: &WorldState, fork: &WorldState) -> Self {
        Self {
            turn,
            overlays: map_diff(base.overlays(), fork.overlays()),
            variables: map_diff(base.variables(), fork.variables()),
        }
    }

    /// Largest absolute divergence across overlays and variables
    pub fn max_abs(&self) -> f64 {
        self.overlays
            .values()
            .chain(self.variables.values())
            .fold(0.0, |acc, d| acc.max(d.abs()))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.overlays
            .get(name)
            .or_else(|| self.variables.get(name))
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualRun {
    pub base: Vec<TurnResult>,
    pub forked: Vec<TurnResult>,
    /// Record `t` is the divergence at the start of turn `t`; record 0 is
    /// the intervention itself
    pub divergence: Vec<DivergenceRecord>,
    /// Divergence after the last turn
    pub final_divergence: DivergenceRecord,
    /// Delta each intervention actually applied (after overlay clamping)
    pub applied: BTreeMap<String, f64>,
    pub base_final: WorldState,
    pub forked_final: WorldState,
}

/// Apply interventions in name order; returns the applied deltas
///
/// Names that are existing overlays are treated as overlays (clamped),
/// everything else as a variable.
pub fn apply_interventions(
    state: &mut WorldState,
    interventions: &BTreeMap<String, Intervention>,
) -> Result<BTreeMap<String, f64>> {
    let mut applied = BTreeMap::new();
    for (name, intervention) in interventions {
        if state.is_overlay(name) {
            let before = state.overlay(name).unwrap_or(0.0);
            let after = match intervention {
                Intervention::Set(value) => mutation::set_overlay(state, name, *value)?,
                Intervention::Delta(delta) => mutation::adjust_overlay(state, name, *delta)?,
            };
            applied.insert(name.clone(), after - before);
        } else {
            let before = state.variable(name).unwrap_or(0.0);
            let after = match intervention {
                Intervention::Set(value) => {
                    mutation::set_variable(state, name, *value)?;
                    *value
                }
                Intervention::Delta(delta) => mutation::adjust_variable(state, name, *delta)?,
            };
            applied.insert(name.clone(), after - before);
        }
    }
    Ok(applied)
}

/// Per-turn state snapshots plus results for one side of the comparison
struct Trajectory {
    starts: Vec<WorldState>,
    results: Vec<TurnResult>,
    end: WorldState,
}

fn run_trajectory(mut sim: Simulator, mut state: WorldState, turns: u64) -> Trajectory {
    sim.clear_gravity_override();
    let mut starts = Vec::with_capacity(turns as usize);
    let mut results = Vec::with_capacity(turns as usize);
    for _ in 0..turns {
        starts.push(state.snapshot());
        results.push(sim.simulate_turn(&mut state));
    }
    Trajectory {
        starts,
        results,
        end: state,
    }
}

impl Simulator {
    /// Run a base and an intervention-forked copy of `initial` side by side
    ///
    /// Fails only when an intervention value is non-finite. The live
    /// simulator is not advanced; both runs use clones of it.
    pub fn simulate_counterfactual(
        &self,
        initial: &WorldState,
        interventions: &BTreeMap<String, Intervention>,
        turns: u64,
    ) -> Result<CounterfactualRun> {
        let base_state = initial.snapshot();
        let mut fork_state = initial.snapshot();
        let applied = apply_interventions(&mut fork_state, interventions)?;
        mutation::record_event(
            &mut fork_state,
            format!("counterfactual fork: {} intervention(s)", applied.len()),
        );

        let base_sim = self.clone();
        let fork_sim = self.clone();
        let (base, fork) = rayon::join(
            move || run_trajectory(base_sim, base_state, turns),
            move || run_trajectory(fork_sim, fork_state, turns),
        );

        let divergence: Vec<DivergenceRecord> = base
            .starts
            .iter()
            .zip(&fork.starts)
            .enumerate()
            .map(|(t, (b, f))| DivergenceRecord::between(t as Turn, b, f))
            .collect();
        let final_divergence = DivergenceRecord::between(turns, &base.end, &fork.end);

        tracing::info!(
            turns,
            interventions = applied.len(),
            final_max = final_divergence.max_abs(),
            "Counterfactual complete"
        );

        Ok(CounterfactualRun {
            base: base.results,
            forked: fork.results,
            divergence,
            final_divergence,
            applied,
            base_final: base.end,
            forked_final: fork.end,
        })
    }
}
