//! Turn loop: single turns, forward runs, and counterfactual forks

pub mod counterfactual;
pub mod forward;
pub mod result;
pub mod tagging;
pub mod trust;
pub mod turn;

pub use counterfactual::{apply_interventions, CounterfactualRun, DivergenceRecord, Intervention};
pub use forward::{ForwardOptions, SimulationRun, StopReason};
pub use result::{TurnDeltas, TurnResult};
pub use tagging::{
    registered_taggers, tagger_from_name, HeuristicTagger, SymbolicTag, SymbolicTagger,
    TrendTagger,
};
pub use trust::{InfluenceTrustEnricher, TrustEnricher, TrustLabel, TrustMetadata};
pub use turn::Simulator;
