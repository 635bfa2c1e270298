//! Symbolic gravity: corrections toward symbolically expected values and
//! the shadow monitor that watches them

pub mod fabric;
pub mod shadow;
pub mod thresholds;
pub mod transform;

pub use fabric::{GravityCorrection, GravityTurnMetrics, SymbolicGravityFabric};
pub use shadow::{GravityOverrideTrigger, OverridePolicy, ShadowModelMonitor};
pub use thresholds::AdaptiveThresholds;
pub use transform::{default_mappings, SymbolicMapping};
