//! RetrodictionPipeline - detector -> trigger -> scenarios -> writer
//!
//! Single consumer: every ingest and drain runs on the caller's thread, so
//! detector and trigger updates are serialized. Only persistence is handed
//! off to the writer thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::config::PulseConfig;
use crate::core::error::Result;
use crate::core::types::Turn;
use crate::regime::detector::RegimeDetector;
use crate::regime::stream::{EventProducer, EventStreamManager};
use crate::regime::types::{NewsEvent, RegimeChangeEvent, RegimeType};
use crate::retrodiction::counterfactual::{
    CounterfactualSimulator, RetrodictionReport, SimulatorCausalModel,
};
use crate::retrodiction::scenarios::ScenarioCatalog;
use crate::retrodiction::snapshot::RetrodictionSnapshot;
use crate::retrodiction::trigger::RetrodictionTrigger;
use crate::retrodiction::writer::{SnapshotWriter, WriterStats};
use crate::simulation::turn::Simulator;
use crate::world::state::WorldState;

/// Ingestion items buffered between producers and `drain_stream`
const INGEST_QUEUE_CAPACITY: usize = 1024;

pub struct RetrodictionPipeline {
    detector: RegimeDetector,
    trigger: RetrodictionTrigger,
    counterfactual: CounterfactualSimulator,
    stream: EventStreamManager,
    writer: Option<SnapshotWriter>,
    baseline: WorldState,
}

impl RetrodictionPipeline {
    /// Wire the pipeline and start the snapshot writer
    ///
    /// `simulator` becomes the default causal model; `baseline` is the world
    /// scenarios start from until `set_baseline` replaces it.
    pub fn new(config: &PulseConfig, simulator: Simulator, baseline: WorldState) -> Result<Self> {
        config.validate()?;
        let model = SimulatorCausalModel::new(simulator, config.retrodiction.scenario_turns);
        let counterfactual = CounterfactualSimulator::new(Arc::new(model), ScenarioCatalog::default())
            .with_parallel(config.retrodiction.parallel_scenarios);

        Ok(Self {
            detector: RegimeDetector::new(&config.regime),
            trigger: RetrodictionTrigger::new(&config.retrodiction),
            counterfactual,
            stream: EventStreamManager::new(INGEST_QUEUE_CAPACITY),
            writer: Some(SnapshotWriter::spawn(&config.storage)?),
            baseline,
        })
    }

    /// Keep reports in memory only
    pub fn without_writer(mut self) -> Self {
        if let Some(writer) = self.writer.take() {
            writer.shutdown();
        }
        self
    }

    pub fn with_counterfactual(mut self, counterfactual: CounterfactualSimulator) -> Self {
        self.counterfactual = counterfactual;
        self
    }

    pub fn detector(&self) -> &RegimeDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut RegimeDetector {
        &mut self.detector
    }

    pub fn trigger(&self) -> &RetrodictionTrigger {
        &self.trigger
    }

    pub fn counterfactual(&self) -> &CounterfactualSimulator {
        &self.counterfactual
    }

    /// Handle for ingestion threads
    pub fn producer(&self) -> EventProducer {
        self.stream.producer()
    }

    /// Replace the world that scenarios start from
    pub fn set_baseline(&mut self, state: &WorldState) {
        self.baseline = state.snapshot();
    }

    pub fn ingest_economic_data(
        &mut self,
        data: &BTreeMap<String, f64>,
    ) -> Result<Option<RetrodictionReport>> {
        let change = self.detector.ingest_economic_data(data)?;
        Ok(change.and_then(|event| self.handle_regime_change(&event)))
    }

    pub fn ingest_news_event(&mut self, event: &NewsEvent) -> Result<Option<RetrodictionReport>> {
        let change = self.detector.ingest_news_event(event)?;
        Ok(change.and_then(|event| self.handle_regime_change(&event)))
    }

    /// Drain queued producer events; returns reports for any snapshots taken
    pub fn drain_stream(&mut self) -> Vec<RetrodictionReport> {
        let drained = self.stream.drain_into(&mut self.detector);
        drained
            .changes
            .iter()
            .filter_map(|event| self.handle_regime_change(event))
            .collect()
    }

    /// Snapshot, run, and persist for one regime change (subject to cooldown)
    pub fn handle_regime_change(&mut self, event: &RegimeChangeEvent) -> Option<RetrodictionReport> {
        let snapshot = self.trigger.handle_regime_change(event)?;
        Some(self.execute(snapshot))
    }

    /// Advance the trigger's turn clock, running a periodic snapshot when due
    pub fn tick_turn(&mut self, turn: Turn) -> Option<RetrodictionReport> {
        let mut snapshot = self.trigger.tick_turn(turn)?;
        let current = self.detector.current_regime();
        if current != RegimeType::Normal {
            snapshot.regime_type = Some(current);
        }
        Some(self.execute(snapshot))
    }

    /// Operator-requested retrodiction for `regime`
    pub fn manual(&mut self, regime: RegimeType, evidence: BTreeMap<String, f64>) -> RetrodictionReport {
        let snapshot = self.trigger.manual(Some(regime), evidence);
        self.execute(snapshot)
    }

    fn execute(&self, snapshot: RetrodictionSnapshot) -> RetrodictionReport {
        let snapshot = snapshot.with_world_state(&self.baseline);
        let report = self.counterfactual.run_snapshot(&snapshot, &self.baseline);
        if let Some(writer) = &self.writer {
            writer.submit(report.clone());
        }
        report
    }

    pub fn writer_stats(&self) -> Option<WriterStats> {
        self.writer.as_ref().map(SnapshotWriter::stats)
    }

    /// Flush pending writes and stop the writer
    pub fn shutdown(mut self) -> Option<WriterStats> {
        self.writer.take().map(SnapshotWriter::shutdown)
    }
}
