//! EventStreamManager - bounded hand-off from ingestion threads to the detector
//!
//! Any number of producers push from any thread; exactly one manager drains
//! the queue into a detector, so detector updates stay serialized.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::core::error::{PulseError, Result};
use crate::regime::detector::RegimeDetector;
use crate::regime::types::{NewsEvent, RegimeChangeEvent};

/// One queued ingestion item
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Economic {
        data: BTreeMap<String, f64>,
        timestamp: DateTime<Utc>,
    },
    News {
        event: NewsEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Cloneable, thread-safe push handle
#[derive(Debug, Clone)]
pub struct EventProducer {
    tx: Sender<IngestEvent>,
}

impl EventProducer {
    pub fn push_economic(&self, data: BTreeMap<String, f64>) -> Result<()> {
        self.push(IngestEvent::Economic {
            data,
            timestamp: Utc::now(),
        })
    }

    pub fn push_news(&self, event: NewsEvent) -> Result<()> {
        self.push(IngestEvent::News {
            event,
            timestamp: Utc::now(),
        })
    }

    /// Non-blocking push; a full queue is reported, never waited on
    pub fn push(&self, event: IngestEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => PulseError::QueueFull,
            TrySendError::Disconnected(_) => PulseError::QueueClosed,
        })
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub processed: usize,
    /// Items the detector rejected as malformed
    pub dropped: usize,
    pub changes: Vec<RegimeChangeEvent>,
}

#[derive(Debug)]
pub struct EventStreamManager {
    rx: Receiver<IngestEvent>,
    tx: Sender<IngestEvent>,
}

impl EventStreamManager {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { rx, tx }
    }

    pub fn producer(&self) -> EventProducer {
        EventProducer {
            tx: self.tx.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Feed everything currently queued into `detector`, in arrival order
    ///
    /// Malformed items are logged and dropped; the detector is unchanged by them.
    pub fn drain_into(&self, detector: &mut RegimeDetector) -> DrainReport {
        let mut report = DrainReport::default();
        for item in self.rx.try_iter() {
            report.processed += 1;
            let outcome = match &item {
                IngestEvent::Economic { data, timestamp } => {
                    detector.ingest_economic_data_at(data, *timestamp)
                }
                IngestEvent::News { event, timestamp } => {
                    detector.ingest_news_event_at(event, *timestamp)
                }
            };
            match outcome {
                Ok(Some(change)) => report.changes.push(change),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed ingestion event");
                    report.dropped += 1;
                }
            }
        }
        if report.processed > 0 {
            tracing::debug!(
                processed = report.processed,
                dropped = report.dropped,
                changes = report.changes.len(),
                "Event stream drained"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RegimeConfig;
    use crate::regime::types::RegimeType;

    #[test]
    fn test_full_queue_reports_backpressure() {
        let manager = EventStreamManager::new(1);
        let producer = manager.producer();
        producer.push_news(NewsEvent::new("Calm day", 0.1)).unwrap();
        let err = producer.push_news(NewsEvent::new("Another", 0.1)).unwrap_err();
        assert!(matches!(err, PulseError::QueueFull));
    }

    #[test]
    fn test_closed_queue_reports_closed() {
        let manager = EventStreamManager::new(4);
        let producer = manager.producer();
        drop(manager);
        let err = producer.push_news(NewsEvent::new("Late", 0.1)).unwrap_err();
        assert!(matches!(err, PulseError::QueueClosed));
    }

    #[test]
    fn test_drain_from_many_threads() {
        let manager = EventStreamManager::new(64);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let producer = manager.producer();
                std::thread::spawn(move || {
                    for i in 0..5 {
                        let mut data = BTreeMap::new();
                        data.insert("interest_rate".to_string(), (t * 5 + i) as f64);
                        producer.push_economic(data).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        let report = manager.drain_into(&mut detector);

        assert_eq!(report.processed, 20);
        assert_eq!(report.dropped, 0);
        assert_eq!(detector.observations(), 20);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_malformed_items_dropped() {
        let manager = EventStreamManager::new(8);
        let producer = manager.producer();
        producer.push_economic(BTreeMap::new()).unwrap();
        producer.push_news(NewsEvent::new("Rate hike", 0.9)).unwrap();

        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        let report = manager.drain_into(&mut detector);

        assert_eq!(report.processed, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(detector.current_regime(), RegimeType::Normal);
    }
}
