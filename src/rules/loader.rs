//! Load causal rules and overlay decay rates from TOML
//!
//! ```toml
//! [overlay_decay]
//! default = 0.01
//! fear = 0.05
//!
//! [[rules]]
//! id = "despair_feeds_fear"
//! priority = 10
//! when = { overlay = "despair", above = 0.3 }
//! effects = [{ overlay = "fear", delta = 0.04, proportional = true }]
//! ```

use std::fs;
use std::path::Path;

use crate::core::error::{PulseError, Result};
use crate::rules::causal_rules::{
    Comparison, Condition, EffectTemplate, StateTarget, ThresholdRule,
};
use crate::rules::dynamics::OverlayDynamics;

/// Rules plus decay rates parsed from one document
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub rules: Vec<ThresholdRule>,
    pub overlay_decay: Option<OverlayDynamics>,
}

/// Load a rule set from a TOML file
pub fn load_rule_set(path: &Path) -> Result<RuleSet> {
    let content = fs::read_to_string(path).map_err(|e| {
        PulseError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
    })?;
    load_rule_set_toml(&content)
}

/// Parse a rule set from a TOML string
pub fn load_rule_set_toml(content: &str) -> Result<RuleSet> {
    let toml: toml::Value = content.parse()?;
    let mut rule_set = RuleSet::default();

    if let Some(decay) = toml.get("overlay_decay").and_then(|v| v.as_table()) {
        let mut dynamics = OverlayDynamics::default();
        for (name, rate) in decay {
            let rate = rate
                .as_float()
                .ok_or_else(|| invalid(format!("overlay_decay.{} must be a float", name)))?;
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(format!(
                    "overlay_decay.{} ({}) must be within [0, 1]",
                    name, rate
                )));
            }
            if name == "default" {
                dynamics.default_rate = rate;
            } else {
                dynamics.insert(name.clone(), rate);
            }
        }
        rule_set.overlay_decay = Some(dynamics);
    }

    if let Some(rules) = toml.get("rules").and_then(|v| v.as_array()) {
        for rule in rules {
            rule_set.rules.push(parse_rule(rule)?);
        }
    }

    Ok(rule_set)
}

fn parse_rule(value: &toml::Value) -> Result<ThresholdRule> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid("rule missing id"))?
        .to_string();

    let priority = value
        .get("priority")
        .and_then(|v| v.as_integer())
        .unwrap_or(0);
    let priority = i32::try_from(priority)
        .map_err(|_| invalid(format!("{}: priority {} out of range", id, priority)))?;

    let when = value
        .get("when")
        .ok_or_else(|| invalid(format!("{}: rule missing when", id)))?;
    let condition = parse_condition(when, &id)?;

    let effects = value
        .get("effects")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid(format!("{}: rule missing effects", id)))?
        .iter()
        .map(|effect| parse_effect(effect, &id))
        .collect::<Result<Vec<_>>>()?;
    if effects.is_empty() {
        return Err(invalid(format!("{}: rule has no effects", id)));
    }

    let description = value
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(ThresholdRule {
        id,
        priority,
        condition,
        effects,
        description,
    })
}

fn parse_condition(value: &toml::Value, rule_id: &str) -> Result<Condition> {
    let (target, name) = parse_target(value)
        .ok_or_else(|| invalid(format!("{}: when needs overlay, variable or capital", rule_id)))?;

    let (comparison, threshold) = if let Some(t) = value.get("above").and_then(as_number) {
        (Comparison::Above, t)
    } else if let Some(t) = value.get("below").and_then(as_number) {
        (Comparison::Below, t)
    } else {
        return Err(invalid(format!("{}: when needs above or below", rule_id)));
    };

    Ok(Condition {
        target,
        name,
        comparison,
        threshold,
    })
}

fn parse_effect(value: &toml::Value, rule_id: &str) -> Result<EffectTemplate> {
    let (target, name) = parse_target(value)
        .ok_or_else(|| invalid(format!("{}: effect needs overlay, variable or capital", rule_id)))?;

    let delta = value
        .get("delta")
        .and_then(as_number)
        .ok_or_else(|| invalid(format!("{}: effect on '{}' missing delta", rule_id, name)))?;

    let proportional = value
        .get("proportional")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(EffectTemplate {
        target,
        name,
        delta,
        proportional,
    })
}

fn parse_target(value: &toml::Value) -> Option<(StateTarget, String)> {
    [
        ("overlay", StateTarget::Overlay),
        ("variable", StateTarget::Variable),
        ("capital", StateTarget::Capital),
    ]
    .into_iter()
    .find_map(|(key, target)| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(|name| (target, name.to_string()))
    })
}

/// TOML integers are accepted wherever a float is expected
fn as_number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn invalid(msg: impl Into<String>) -> PulseError {
    PulseError::InvalidConfig(msg.into())
}
