//! RegimeDetector - stateful classification of the prevailing regime
//!
//! Evidence accumulates in two places:
//! - indicator momentum: an EWMA of the sign of each indicator's change,
//!   in [-1, 1]; rising momentum evidences the indicator's "rising" signal
//!   and falling momentum its "falling" signal
//! - news evidence: an EWMA of matched keyword priority per signal, decayed
//!   on every ingest
//!
//! Each regime's confidence is its profile-weighted indicator evidence plus
//! `news_weight` times its profile-weighted news evidence, clamped to [0, 1].
//! News-only regimes use the news evidence directly.
//!
//! Phases: Nominal -> CandidateShift -> (emit) -> Nominal under the new regime.
//! Once a regime is adopted, a challenger must beat its confidence by
//! `switch_margin` as well as clear `change_threshold`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::config::RegimeConfig;
use crate::core::error::{PulseError, Result};
use crate::core::types::RegimeEventId;
use crate::regime::signals::{indicator_signals, news_signals, SignalKind, REGIME_PROFILES};
use crate::regime::types::{NewsEvent, RegimeChangeEvent, RegimeType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetectorPhase {
    Nominal,
    CandidateShift { regime: RegimeType, confidence: f64 },
}

#[derive(Debug, Clone)]
pub struct RegimeDetector {
    config: RegimeConfig,
    last_values: BTreeMap<String, f64>,
    momentum: BTreeMap<String, f64>,
    news: BTreeMap<SignalKind, f64>,
    observations: u64,
    current: RegimeType,
    phase: DetectorPhase,
    confidences: BTreeMap<RegimeType, f64>,
}

impl RegimeDetector {
    pub fn new(config: &RegimeConfig) -> Self {
        Self {
            config: config.clone(),
            last_values: BTreeMap::new(),
            momentum: BTreeMap::new(),
            news: BTreeMap::new(),
            observations: 0,
            current: RegimeType::Normal,
            phase: DetectorPhase::Nominal,
            confidences: BTreeMap::new(),
        }
    }

    /// Back to the baseline: Normal regime, no evidence, no history
    pub fn reset(&mut self) {
        *self = Self::new(&self.config);
        tracing::debug!("Regime detector reset");
    }

    pub fn current_regime(&self) -> RegimeType {
        self.current
    }

    pub fn phase(&self) -> DetectorPhase {
        self.phase
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Latest confidence per candidate regime
    pub fn confidences(&self) -> &BTreeMap<RegimeType, f64> {
        &self.confidences
    }

    pub fn confidence(&self, regime: RegimeType) -> f64 {
        self.confidences.get(&regime).copied().unwrap_or(0.0)
    }

    pub fn ingest_economic_data(
        &mut self,
        data: &BTreeMap<String, f64>,
    ) -> Result<Option<RegimeChangeEvent>> {
        self.ingest_economic_data_at(data, Utc::now())
    }

    /// Fold one economic record into the evidence
    ///
    /// Malformed records are rejected with `RegimeClassification` and leave
    /// the detector untouched.
    pub fn ingest_economic_data_at(
        &mut self,
        data: &BTreeMap<String, f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<RegimeChangeEvent>> {
        if data.is_empty() {
            return Err(PulseError::RegimeClassification(
                "economic record is empty".to_string(),
            ));
        }
        if let Some((name, value)) = data.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PulseError::RegimeClassification(format!(
                "indicator '{}' is not finite ({})",
                name, value
            )));
        }

        let alpha = self.config.smoothing;
        for (name, value) in data {
            if indicator_signals(name).is_none() {
                continue;
            }
            let key = name.to_ascii_lowercase();
            if let Some(previous) = self.last_values.insert(key.clone(), *value) {
                let change = value - previous;
                let direction = if change > self.config.change_epsilon {
                    1.0
                } else if change < -self.config.change_epsilon {
                    -1.0
                } else {
                    0.0
                };
                let m = self.momentum.entry(key).or_insert(0.0);
                *m = alpha * direction + (1.0 - alpha) * *m;
            }
        }
        self.decay_news();

        self.observations += 1;
        Ok(self.classify(timestamp))
    }

    pub fn ingest_news_event(&mut self, event: &NewsEvent) -> Result<Option<RegimeChangeEvent>> {
        self.ingest_news_event_at(event, Utc::now())
    }

    /// Fold one news item into the evidence
    pub fn ingest_news_event_at(
        &mut self,
        event: &NewsEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<RegimeChangeEvent>> {
        if event.headline.trim().is_empty() {
            return Err(PulseError::RegimeClassification(
                "news event has an empty headline".to_string(),
            ));
        }
        if !event.priority.is_finite() || !(0.0..=1.0).contains(&event.priority) {
            return Err(PulseError::RegimeClassification(format!(
                "news priority {} outside [0, 1]",
                event.priority
            )));
        }

        let matched = news_signals(event);
        self.decay_news();
        let alpha = self.config.smoothing;
        for kind in matched {
            let n = self.news.entry(kind).or_insert(0.0);
            *n += alpha * event.priority;
            *n = n.min(1.0);
        }

        self.observations += 1;
        Ok(self.classify(timestamp))
    }

    fn decay_news(&mut self) {
        let keep = 1.0 - self.config.smoothing;
        for n in self.news.values_mut() {
            *n *= keep;
        }
    }

    /// Indicator evidence for one signal, the strongest across indicators
    fn indicator_evidence(&self, kind: SignalKind) -> f64 {
        self.momentum
            .iter()
            .filter_map(|(name, m)| {
                let (rising, falling) = indicator_signals(name)?;
                if rising == kind {
                    Some(m.max(0.0))
                } else if falling == kind {
                    Some((-m).max(0.0))
                } else {
                    None
                }
            })
            .fold(0.0, f64::max)
    }

    fn news_evidence(&self, kind: SignalKind) -> f64 {
        self.news.get(&kind).copied().unwrap_or(0.0)
    }

    fn classify(&mut self, timestamp: DateTime<Utc>) -> Option<RegimeChangeEvent> {
        self.confidences = REGIME_PROFILES
            .iter()
            .map(|profile| {
                let news: f64 = profile
                    .weights
                    .iter()
                    .map(|(kind, w)| w * self.news_evidence(*kind))
                    .sum();
                let confidence = if profile.news_only {
                    news
                } else {
                    let indicators: f64 = profile
                        .weights
                        .iter()
                        .map(|(kind, w)| w * self.indicator_evidence(*kind))
                        .sum();
                    indicators + self.config.news_weight * news
                };
                (profile.regime, confidence.clamp(0.0, 1.0))
            })
            .collect();

        if self.current != RegimeType::Normal && self.confidence(self.current) < self.config.exit_threshold {
            tracing::info!(regime = %self.current, "Regime evidence faded; back to NORMAL");
            self.current = RegimeType::Normal;
        }

        let (best, confidence) = self
            .confidences
            .iter()
            .filter(|(regime, _)| **regime != self.current)
            .max_by_key(|(_, c)| OrderedFloat(**c))
            .map(|(r, c)| (*r, *c))?;

        // Normal is never scored, so this is 0.0 until a regime is adopted
        let incumbent = self.confidence(self.current);
        let leads = confidence > incumbent + self.config.switch_margin;

        if confidence > self.config.change_threshold
            && leads
            && self.observations >= self.config.min_observations
        {
            let event = RegimeChangeEvent {
                id: RegimeEventId::new(),
                timestamp,
                regime_type: best,
                previous_regime: self.current,
                confidence,
                evidence: self.evidence_for(best, confidence),
            };
            tracing::info!(
                regime = %best,
                previous = %self.current,
                confidence,
                "Regime change detected"
            );
            self.current = best;
            self.phase = DetectorPhase::Nominal;
            return Some(event);
        }

        self.phase = if confidence >= self.config.candidate_threshold && confidence > incumbent {
            DetectorPhase::CandidateShift {
                regime: best,
                confidence,
            }
        } else {
            DetectorPhase::Nominal
        };
        None
    }

    fn evidence_for(&self, regime: RegimeType, confidence: f64) -> BTreeMap<String, f64> {
        let mut evidence = BTreeMap::new();
        evidence.insert("confidence".to_string(), confidence);
        if let Some(profile) = REGIME_PROFILES.iter().find(|p| p.regime == regime) {
            for (kind, _) in profile.weights {
                evidence.insert(
                    format!("signal:{}", kind.as_str()),
                    self.indicator_evidence(*kind),
                );
                evidence.insert(format!("news:{}", kind.as_str()), self.news_evidence(*kind));
            }
        }
        for (name, value) in &self.last_values {
            evidence.insert(format!("indicator:{}", name), *value);
        }
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn rising_rates(detector: &mut RegimeDetector, steps: usize) -> Vec<RegimeChangeEvent> {
        (0..steps)
            .filter_map(|i| {
                let data = record(&[
                    ("interest_rate", 0.01 + 0.0025 * i as f64),
                    ("gdp_growth", 0.02),
                ]);
                detector.ingest_economic_data(&data).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_rising_rates_emit_one_tightening() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        let events = rising_rates(&mut detector, 20);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].regime_type, RegimeType::MonetaryTightening);
        assert_eq!(events[0].previous_regime, RegimeType::Normal);
        assert!(events[0].confidence > 0.7);
        assert!(events[0].evidence.contains_key("signal:rate_rising"));
        assert_eq!(detector.current_regime(), RegimeType::MonetaryTightening);
    }

    #[test]
    fn test_passes_through_candidate_shift() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        // Baseline + 2 rises: momentum 0.51, confidence ~0.41
        rising_rates(&mut detector, 3);
        assert!(matches!(
            detector.phase(),
            DetectorPhase::CandidateShift {
                regime: RegimeType::MonetaryTightening,
                ..
            }
        ));
    }

    #[test]
    fn test_flat_input_never_emits() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        let data = record(&[("interest_rate", 0.04), ("inflation", 0.02)]);
        for _ in 0..50 {
            assert!(detector.ingest_economic_data(&data).unwrap().is_none());
        }
        assert_eq!(detector.phase(), DetectorPhase::Nominal);
        assert!(detector.confidences().values().all(|c| *c == 0.0));
    }

    #[test]
    fn test_malformed_record_leaves_state() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        rising_rates(&mut detector, 3);
        let before = detector.confidences().clone();
        let observations = detector.observations();

        let err = detector
            .ingest_economic_data(&record(&[("interest_rate", f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, PulseError::RegimeClassification(_)));
        assert!(detector.ingest_economic_data(&BTreeMap::new()).is_err());

        assert_eq!(detector.confidences(), &before);
        assert_eq!(detector.observations(), observations);
    }

    #[test]
    fn test_bad_news_rejected() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        assert!(detector.ingest_news_event(&NewsEvent::new("  ", 0.5)).is_err());
        assert!(detector.ingest_news_event(&NewsEvent::new("War", 1.5)).is_err());
        assert_eq!(detector.observations(), 0);
    }

    #[test]
    fn test_sustained_war_news_is_geopolitical_shock() {
        let config = RegimeConfig {
            smoothing: 0.5,
            ..RegimeConfig::default()
        };
        let mut detector = RegimeDetector::new(&config);
        let events: Vec<_> = (0..10)
            .filter_map(|_| {
                detector
                    .ingest_news_event(&NewsEvent::new("Invasion escalates into war", 1.0))
                    .unwrap()
            })
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].regime_type, RegimeType::GeopoliticalShock);
    }

    #[test]
    fn test_co_moving_rates_and_prices_emit_once() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        let events: Vec<_> = (0..20)
            .filter_map(|i| {
                let data = record(&[
                    ("interest_rate", 0.01 + 0.0025 * i as f64),
                    ("inflation", 0.02 + 0.001 * i as f64),
                ]);
                detector.ingest_economic_data(&data).unwrap()
            })
            .collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_regime, RegimeType::Normal);
        assert!(matches!(
            events[0].regime_type,
            RegimeType::MonetaryTightening | RegimeType::InflationSurge
        ));
        assert_eq!(detector.current_regime(), events[0].regime_type);
    }

    #[test]
    fn test_clear_challenger_still_takes_over() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        rising_rates(&mut detector, 20);
        assert_eq!(detector.current_regime(), RegimeType::MonetaryTightening);

        // Rates hold still while prices climb
        let events: Vec<_> = (1..25)
            .filter_map(|i| {
                let data = record(&[
                    ("interest_rate", 0.0575),
                    ("inflation", 0.03 + 0.002 * i as f64),
                ]);
                detector.ingest_economic_data(&data).unwrap()
            })
            .collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].regime_type, RegimeType::InflationSurge);
        assert_eq!(events[0].previous_regime, RegimeType::MonetaryTightening);
    }

    #[test]
    fn test_regime_relaxes_to_normal() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        rising_rates(&mut detector, 20);
        let flat = record(&[("interest_rate", 0.5)]);
        for _ in 0..30 {
            detector.ingest_economic_data(&flat).unwrap();
        }
        assert_eq!(detector.current_regime(), RegimeType::Normal);
    }

    #[test]
    fn test_reset_restores_baseline() {
        let mut detector = RegimeDetector::new(&RegimeConfig::default());
        rising_rates(&mut detector, 20);
        detector.reset();
        assert_eq!(detector.current_regime(), RegimeType::Normal);
        assert_eq!(detector.observations(), 0);
        assert!(detector.confidences().is_empty());

        // Same series again re-detects the same regime
        assert_eq!(rising_rates(&mut detector, 20).len(), 1);
    }
}
