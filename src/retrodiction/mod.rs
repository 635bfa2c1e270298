//! Retrodiction: snapshots on regime change, counterfactual scenarios, and
//! asynchronous persistence of the results

pub mod counterfactual;
pub mod pipeline;
pub mod scenarios;
pub mod snapshot;
pub mod trigger;
pub mod writer;

pub use counterfactual::{
    CausalModel, CounterfactualSimulator, RetrodictionReport, ScenarioResult, ScenarioStatus,
    SimulatorCausalModel,
};
pub use pipeline::RetrodictionPipeline;
pub use scenarios::{InterventionScenario, ScenarioCatalog};
pub use snapshot::{RetrodictionSnapshot, SnapshotCause, SnapshotPriority};
pub use trigger::{CooldownScope, CooldownWindow, RetrodictionTrigger};
pub use writer::{persist_report, snapshot_file_name, SnapshotWriter, WriterStats};
