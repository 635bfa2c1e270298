//! Causal rules, their execution engine, and overlay decay dynamics

pub mod builtin;
pub mod causal_rules;
pub mod dynamics;
pub mod engine;
pub mod loader;

pub use causal_rules::{
    CausalRule, Comparison, Condition, EffectTemplate, RuleContext, RuleEffect, ShockRule,
    StateTarget, ThresholdRule,
};
pub use dynamics::OverlayDynamics;
pub use engine::{RuleEngine, RuleFailure, RuleOutcome};
pub use loader::{load_rule_set, load_rule_set_toml, RuleSet};
