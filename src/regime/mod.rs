//! Regime detection over streamed economic data and news

pub mod detector;
pub mod signals;
pub mod stream;
pub mod types;

pub use detector::{DetectorPhase, RegimeDetector};
pub use signals::{RegimeProfile, SignalKind, REGIME_PROFILES};
pub use stream::{DrainReport, EventProducer, EventStreamManager, IngestEvent};
pub use types::{NewsEvent, RegimeChangeEvent, RegimeType};
