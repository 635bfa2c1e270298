//! CounterfactualSimulator - executes a snapshot's scenarios against a causal model
//!
//! The causal model is a capability: the default runs the Simulator's own
//! base-vs-fork comparison, but any `CausalModel` can be plugged in.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::regime::types::RegimeType;
use crate::retrodiction::scenarios::{InterventionScenario, ScenarioCatalog};
use crate::retrodiction::snapshot::RetrodictionSnapshot;
use crate::simulation::turn::Simulator;
use crate::world::state::WorldState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Completed,
    Failed { reason: String },
}

/// Outcome of one scenario on its target variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub status: ScenarioStatus,
    pub turns: u64,
    pub applied: BTreeMap<String, f64>,
    pub baseline: BTreeMap<String, f64>,
    pub counterfactual: BTreeMap<String, f64>,
    /// counterfactual - baseline per target
    pub effects: BTreeMap<String, f64>,
}

impl ScenarioResult {
    pub fn failed(scenario: &InterventionScenario, reason: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario.name.clone(),
            status: ScenarioStatus::Failed {
                reason: reason.into(),
            },
            turns: 0,
            applied: BTreeMap::new(),
            baseline: BTreeMap::new(),
            counterfactual: BTreeMap::new(),
            effects: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ScenarioStatus::Completed
    }
}

/// Capability: run one scenario from a baseline world
pub trait CausalModel: Send + Sync {
    fn run_scenario(&self, baseline: &WorldState, scenario: &InterventionScenario) -> Result<ScenarioResult>;
}

/// Default model: base vs. fork through a cloned Simulator
#[derive(Debug, Clone)]
pub struct SimulatorCausalModel {
    simulator: Simulator,
    turns: u64,
}

impl SimulatorCausalModel {
    pub fn new(simulator: Simulator, turns: u64) -> Self {
        Self {
            simulator,
            turns: turns.max(1),
        }
    }
}

impl CausalModel for SimulatorCausalModel {
    fn run_scenario(&self, baseline: &WorldState, scenario: &InterventionScenario) -> Result<ScenarioResult> {
        let run = self
            .simulator
            .simulate_counterfactual(baseline, &scenario.interventions, self.turns)?;

        let mut result = ScenarioResult {
            scenario_name: scenario.name.clone(),
            status: ScenarioStatus::Completed,
            turns: self.turns,
            applied: run.applied,
            baseline: BTreeMap::new(),
            counterfactual: BTreeMap::new(),
            effects: BTreeMap::new(),
        };
        for target in &scenario.target_variables {
            let base = read_value(&run.base_final, target);
            let fork = read_value(&run.forked_final, target);
            if base.is_none() && fork.is_none() {
                tracing::debug!(scenario = %scenario.name, target = %target, "Target absent from both runs");
                continue;
            }
            let base = base.unwrap_or(0.0);
            let fork = fork.unwrap_or(0.0);
            result.baseline.insert(target.clone(), base);
            result.counterfactual.insert(target.clone(), fork);
            result.effects.insert(target.clone(), fork - base);
        }
        Ok(result)
    }
}

fn read_value(state: &WorldState, name: &str) -> Option<f64> {
    state.variable(name).or_else(|| state.overlay(name))
}

/// A snapshot with its executed scenarios; the unit that gets persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrodictionReport {
    pub snapshot: RetrodictionSnapshot,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<ScenarioResult>,
}

pub struct CounterfactualSimulator {
    model: Arc<dyn CausalModel>,
    catalog: ScenarioCatalog,
    parallel: bool,
}

impl CounterfactualSimulator {
    pub fn new(model: Arc<dyn CausalModel>, catalog: ScenarioCatalog) -> Self {
        Self {
            model,
            catalog,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ScenarioCatalog {
        &mut self.catalog
    }

    /// Scenarios the catalog builds for `regime`
    pub fn scenarios_for(
        &self,
        regime: RegimeType,
        snapshot: Option<&RetrodictionSnapshot>,
    ) -> Vec<InterventionScenario> {
        self.catalog.build(regime, snapshot)
    }

    /// Run one scenario; model errors become a failed result
    pub fn run_scenario(&self, baseline: &WorldState, scenario: &InterventionScenario) -> ScenarioResult {
        match self.model.run_scenario(baseline, scenario) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(scenario = %scenario.name, error = %e, "Scenario failed");
                ScenarioResult::failed(scenario, e.to_string())
            }
        }
    }

    /// Run scenarios in input order, on the rayon pool when parallel
    pub fn run_batch(&self, baseline: &WorldState, scenarios: &[InterventionScenario]) -> Vec<ScenarioResult> {
        if self.parallel {
            scenarios
                .par_iter()
                .map(|scenario| self.run_scenario(baseline, scenario))
                .collect()
        } else {
            scenarios
                .iter()
                .map(|scenario| self.run_scenario(baseline, scenario))
                .collect()
        }
    }

    /// Build and run the scenarios for a snapshot
    ///
    /// The snapshot's attached world state is the baseline when present,
    /// otherwise `fallback`.
    pub fn run_snapshot(&self, snapshot: &RetrodictionSnapshot, fallback: &WorldState) -> RetrodictionReport {
        let regime = snapshot.regime_type.unwrap_or_default();
        let scenarios = self.catalog.build(regime, Some(snapshot));
        let baseline = snapshot.world_state.as_ref().unwrap_or(fallback);
        let results = self.run_batch(baseline, &scenarios);

        tracing::info!(
            snapshot = %snapshot.id,
            regime = %regime,
            scenarios = results.len(),
            failed = results.iter().filter(|r| !r.is_completed()).count(),
            "Retrodiction scenarios executed"
        );

        RetrodictionReport {
            snapshot: snapshot.clone(),
            generated_at: Utc::now(),
            results,
        }
    }
}
