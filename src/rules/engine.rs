//! RuleEngine - ordered, fault-isolated rule execution
//!
//! Rules run in a fixed order (priority descending, then id ascending) so
//! that identical inputs always fire the same sequence. Each firing rule's
//! effects are applied to a staged copy and committed only if every effect
//! succeeds; a failing rule is logged and skipped without aborting the turn.

use std::sync::Arc;

use crate::core::error::{PulseError, Result};
use crate::rules::builtin::default_rules;
use crate::rules::causal_rules::{CausalRule, RuleContext, RuleEffect, StateTarget, ThresholdRule};
use crate::world::mutation;
use crate::world::state::WorldState;

/// A rule that raised during evaluation or whose effects were rejected
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub rule_id: String,
    pub reason: String,
}

/// What happened during one `run_rules` pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Ids of rules whose effects were committed, in execution order
    pub fired: Vec<String>,
    pub failures: Vec<RuleFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Arc<dyn CausalRule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine loaded with the built-in rule table
    pub fn with_default_rules() -> Self {
        Self::from_table(default_rules())
    }

    /// Register a table of rules; rows that cannot be registered are skipped
    /// with a warning
    pub fn from_table(rules: impl IntoIterator<Item = ThresholdRule>) -> Self {
        let mut engine = Self::new();
        for rule in rules {
            let id = rule.id.clone();
            match engine.register(Arc::new(rule)) {
                Ok(()) => {}
                Err(e) => tracing::warn!(rule_id = %id, error = %e, "Rule table row skipped"),
            }
        }
        engine
    }

    /// Register a rule, keeping the execution order sorted
    ///
    /// Duplicate ids are rejected so the tie-break stays well defined.
    pub fn register(&mut self, rule: Arc<dyn CausalRule>) -> Result<()> {
        if self.rules.iter().any(|r| r.id() == rule.id()) {
            return Err(PulseError::InvalidConfig(format!(
                "Duplicate rule id '{}'",
                rule.id()
            )));
        }
        self.rules.push(rule);
        self.rules.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(())
    }

    /// Rule ids in execution order
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, mutating `state` in place
    pub fn run_rules(&self, state: &mut WorldState, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for rule in &self.rules {
            let effects = match rule.evaluate(state, ctx) {
                Ok(effects) if effects.is_empty() => continue,
                Ok(effects) => effects,
                Err(e) => {
                    tracing::warn!(rule = rule.id(), turn = ctx.turn, error = %e, "Rule failed; skipping");
                    outcome.failures.push(RuleFailure {
                        rule_id: rule.id().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut staged = state.clone();
            match apply_effects(&mut staged, &effects) {
                Ok(()) => {
                    mutation::record_event(
                        &mut staged,
                        format!("turn {}: rule {} fired", ctx.turn, rule.id()),
                    );
                    *state = staged;
                    outcome.fired.push(rule.id().to_string());
                }
                Err(e) => {
                    let err = PulseError::RuleExecution {
                        rule_id: rule.id().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(rule = rule.id(), turn = ctx.turn, error = %err, "Rule effects rejected; skipping");
                    outcome.failures.push(RuleFailure {
                        rule_id: rule.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(turn = ctx.turn, fired = outcome.fired.len(), "Rules applied");
        outcome
    }
}

fn apply_effects(state: &mut WorldState, effects: &[RuleEffect]) -> Result<()> {
    for effect in effects {
        match effect.target {
            StateTarget::Overlay => {
                mutation::adjust_overlay(state, &effect.name, effect.delta)?;
            }
            StateTarget::Variable => {
                mutation::adjust_variable(state, &effect.name, effect.delta)?;
            }
            StateTarget::Capital => {
                mutation::adjust_capital(state, &effect.name, effect.delta)?;
            }
        }
    }
    Ok(())
}
