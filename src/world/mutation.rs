//! State mutation primitives
//!
//! Every write to a WorldState goes through these functions. They touch
//! nothing but the state passed in, reject non-finite input, and keep
//! overlays inside [0, 1].

use crate::core::error::{PulseError, Result};
use crate::world::state::WorldState;

/// Lower bound for capital holdings
const CAPITAL_FLOOR: f64 = 0.0;

/// Exponentially decay an overlay toward 0
///
/// `rate` is the fraction lost this turn and must lie in [0, 1].
/// Returns the new value, or None if the overlay does not exist.
pub fn decay_overlay(state: &mut WorldState, name: &str, rate: f64) -> Result<Option<f64>> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(PulseError::InvalidStateValue {
            name: format!("{}.decay_rate", name),
            value: rate,
        });
    }
    let Some(current) = state.overlays_mut().get_mut(name) else {
        return Ok(None);
    };
    *current = (*current * (1.0 - rate)).clamp(0.0, 1.0);
    Ok(Some(*current))
}

/// Bounded additive overlay update; a missing overlay starts from 0
pub fn adjust_overlay(state: &mut WorldState, name: &str, delta: f64) -> Result<f64> {
    ensure_finite(name, delta)?;
    let slot = state.overlays_mut().entry(name.to_string()).or_insert(0.0);
    *slot = (*slot + delta).clamp(0.0, 1.0);
    Ok(*slot)
}

/// Direct overlay write, clamped into [0, 1]
pub fn set_overlay(state: &mut WorldState, name: &str, value: f64) -> Result<f64> {
    ensure_finite(name, value)?;
    let clamped = value.clamp(0.0, 1.0);
    state.overlays_mut().insert(name.to_string(), clamped);
    Ok(clamped)
}

/// Bounded additive capital update; holdings never go below the floor
pub fn adjust_capital(state: &mut WorldState, asset: &str, delta: f64) -> Result<f64> {
    ensure_finite(asset, delta)?;
    let slot = state.capital_mut().entry(asset.to_string()).or_insert(0.0);
    let next = *slot + delta;
    ensure_finite(asset, next)?;
    *slot = next.max(CAPITAL_FLOOR);
    Ok(*slot)
}

/// Direct variable write with NaN/Inf rejection
pub fn set_variable(state: &mut WorldState, name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    state.variables_mut().insert(name.to_string(), value);
    Ok(())
}

/// Additive variable update; a missing variable starts from 0
pub fn adjust_variable(state: &mut WorldState, name: &str, delta: f64) -> Result<f64> {
    ensure_finite(name, delta)?;
    let current = state.variable(name).unwrap_or(0.0);
    let next = current + delta;
    set_variable(state, name, next)?;
    Ok(next)
}

/// Append a line to the state's event log
pub fn record_event(state: &mut WorldState, message: impl Into<String>) {
    state.event_log.push(message.into());
}

fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PulseError::InvalidStateValue {
            name: name.to_string(),
            value,
        })
    }
}
