//! Error taxonomy for the simulation and retrodiction kernel
//!
//! Most of these are recovered where they occur (logged, then the substep
//! degrades). Only configuration and initialisation failures reach callers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    /// Non-finite or out-of-range write rejected at the mutation boundary
    #[error("Invalid value for '{name}': {value}")]
    InvalidStateValue { name: String, value: f64 },

    #[error("Rule '{rule_id}' failed: {reason}")]
    RuleExecution { rule_id: String, reason: String },

    #[error("Gravity correction unavailable for '{variable}': {reason}")]
    GravityCorrection { variable: String, reason: String },

    #[error("Shadow monitor could not evaluate: {0}")]
    MonitorTrigger(String),

    #[error("Failed to persist snapshot to {path:?}: {reason}")]
    SnapshotPersistence { path: PathBuf, reason: String },

    #[error("Malformed regime input: {0}")]
    RegimeClassification(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Event queue is full")]
    QueueFull,

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl PulseError {
    /// Whether the kernel treats this error as fatal for the caller
    ///
    /// Everything else is recovered in place by the substep that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PulseError::InvalidConfig(_) | PulseError::TomlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(PulseError::InvalidConfig("bad".into()).is_fatal());
        assert!(!PulseError::MonitorTrigger("no data".into()).is_fatal());
        assert!(!PulseError::RuleExecution {
            rule_id: "r".into(),
            reason: "boom".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_invalid_state_value_message() {
        let err = PulseError::InvalidStateValue {
            name: "inflation".into(),
            value: f64::NAN,
        };
        assert!(err.to_string().contains("inflation"));
    }
}
