//! Causal rule definitions
//!
//! A rule reads an immutable WorldState and proposes `RuleEffect`s. It never
//! writes the state itself; the RuleEngine stages and commits effects.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{PulseError, Result};
use crate::core::types::Turn;
use crate::world::state::WorldState;

/// Which part of the state a condition reads or an effect writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTarget {
    Overlay,
    Variable,
    Capital,
}

impl StateTarget {
    pub fn read(&self, state: &WorldState, name: &str) -> Option<f64> {
        match self {
            StateTarget::Overlay => state.overlay(name),
            StateTarget::Variable => state.variable(name),
            StateTarget::Capital => state.capital(name),
        }
    }
}

/// A concrete change proposed by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffect {
    pub target: StateTarget,
    pub name: String,
    pub delta: f64,
}

/// Per-evaluation context handed to every rule
pub struct RuleContext<'a> {
    pub turn: Turn,
    /// Seeded per-run random source; rules must draw only from this
    pub rng: &'a mut ChaCha8Rng,
}

/// A deterministic causal rule
pub trait CausalRule: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;

    /// Higher priorities run first; ties are broken by id
    fn priority(&self) -> i32 {
        0
    }

    /// Propose effects for this turn. An empty list means the rule did not fire.
    fn evaluate(&self, state: &WorldState, ctx: &mut RuleContext<'_>) -> Result<Vec<RuleEffect>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    Below,
}

/// Firing condition of a threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub target: StateTarget,
    pub name: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Condition {
    /// The observed value when the condition holds
    pub fn check(&self, state: &WorldState) -> Option<f64> {
        let value = self.target.read(state, &self.name)?;
        let holds = match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        };
        holds.then_some(value)
    }
}

/// Effect template of a threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    pub target: StateTarget,
    pub name: String,
    pub delta: f64,
    /// Scale `delta` by the observed trigger value
    #[serde(default)]
    pub proportional: bool,
}

/// Rule that fires when one value crosses a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: String,
    pub priority: i32,
    pub condition: Condition,
    pub effects: Vec<EffectTemplate>,
    #[serde(default)]
    pub description: String,
}

impl CausalRule for ThresholdRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, state: &WorldState, _ctx: &mut RuleContext<'_>) -> Result<Vec<RuleEffect>> {
        let Some(observed) = self.condition.check(state) else {
            return Ok(Vec::new());
        };

        self.effects
            .iter()
            .map(|effect| {
                let delta = if effect.proportional {
                    effect.delta * observed
                } else {
                    effect.delta
                };
                if !delta.is_finite() {
                    return Err(PulseError::RuleExecution {
                        rule_id: self.id.clone(),
                        reason: format!("non-finite delta for '{}'", effect.name),
                    });
                }
                Ok(RuleEffect {
                    target: effect.target,
                    name: effect.name.clone(),
                    delta,
                })
            })
            .collect()
    }
}

/// Seeded uniform shock applied to every variable
///
/// Runs after every other rule. Reproducible because it draws only from
/// the run's seeded generator.
#[derive(Debug, Clone)]
pub struct ShockRule {
    amplitude: f64,
}

impl ShockRule {
    pub const ID: &'static str = "seeded_shock";

    /// None for non-positive amplitudes, which would make the rule a no-op
    pub fn new(amplitude: f64) -> Option<Self> {
        (amplitude.is_finite() && amplitude > 0.0).then_some(Self { amplitude })
    }
}

impl CausalRule for ShockRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn evaluate(&self, state: &WorldState, ctx: &mut RuleContext<'_>) -> Result<Vec<RuleEffect>> {
        Ok(state
            .variables()
            .keys()
            .map(|name| RuleEffect {
                target: StateTarget::Variable,
                name: name.clone(),
                delta: ctx.rng.gen_range(-self.amplitude..=self.amplitude),
            })
            .collect())
    }
}
