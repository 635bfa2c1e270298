//! Default causal rule table
//!
//! Coupling between the symbolic overlays and the macro indicators, kept as
//! data so that rules can be added without touching the engine.

use crate::rules::causal_rules::{
    Comparison, Condition, EffectTemplate, StateTarget, ThresholdRule,
};

use crate::rules::causal_rules::Comparison::{Above, Below};
use crate::rules::causal_rules::StateTarget::{Overlay, Variable};

struct RuleRow {
    id: &'static str,
    priority: i32,
    when: (StateTarget, &'static str, Comparison, f64),
    /// (target, name, delta, proportional)
    effects: &'static [(StateTarget, &'static str, f64, bool)],
    description: &'static str,
}

const DEFAULT_RULES: &[RuleRow] = &[
    RuleRow {
        id: "despair_feeds_fear",
        priority: 10,
        when: (Overlay, "despair", Above, 0.3),
        effects: &[(Overlay, "fear", 0.04, true)],
        description: "Widespread despair amplifies fear",
    },
    RuleRow {
        id: "hope_supports_growth",
        priority: 10,
        when: (Overlay, "hope", Above, 0.55),
        effects: &[(Variable, "gdp_growth", 0.001, false)],
        description: "Optimism nudges output growth upward",
    },
    RuleRow {
        id: "fear_lifts_unemployment",
        priority: 5,
        when: (Overlay, "fear", Above, 0.4),
        effects: &[(Variable, "unemployment", 0.0005, false)],
        description: "Fearful firms hire less",
    },
    RuleRow {
        id: "inflation_erodes_trust",
        priority: 5,
        when: (Variable, "inflation", Above, 0.04),
        effects: &[(Overlay, "trust", -0.02, false), (Overlay, "rage", 0.01, false)],
        description: "High inflation erodes trust and stokes anger",
    },
    RuleRow {
        id: "rate_pressure_on_hope",
        priority: 5,
        when: (Variable, "interest_rate", Above, 0.05),
        effects: &[(Overlay, "hope", -0.01, false), (Variable, "inflation", -0.0005, false)],
        description: "Tight money dampens optimism and prices",
    },
    RuleRow {
        id: "contraction_breeds_despair",
        priority: 1,
        when: (Variable, "gdp_growth", Below, 0.0),
        effects: &[(Overlay, "despair", 0.02, false), (Overlay, "hope", -0.01, false)],
        description: "A shrinking economy breeds despair",
    },
    RuleRow {
        id: "growth_restores_hope",
        priority: 1,
        when: (Variable, "gdp_growth", Above, 0.03),
        effects: &[(Overlay, "hope", 0.01, false)],
        description: "Strong growth restores hope",
    },
    RuleRow {
        id: "unemployment_breeds_despair",
        priority: 1,
        when: (Variable, "unemployment", Above, 0.07),
        effects: &[(Overlay, "despair", 0.01, false)],
        description: "Joblessness breeds despair",
    },
];

/// The built-in rule set
pub fn default_rules() -> Vec<ThresholdRule> {
    DEFAULT_RULES
        .iter()
        .map(|row| {
            let (target, name, comparison, threshold) = row.when;
            ThresholdRule {
                id: row.id.to_string(),
                priority: row.priority,
                condition: Condition {
                    target,
                    name: name.to_string(),
                    comparison,
                    threshold,
                },
                effects: row
                    .effects
                    .iter()
                    .map(|&(target, name, delta, proportional)| EffectTemplate {
                        target,
                        name: name.to_string(),
                        delta,
                        proportional,
                    })
                    .collect(),
                description: row.description.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_rule_ids_are_unique() {
        let rules = default_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_default_rules_have_effects() {
        assert!(default_rules().iter().all(|r| !r.effects.is_empty()));
    }
}
