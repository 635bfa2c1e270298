//! Regime vocabulary and ingestion records

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::RegimeEventId;

/// Macro "mode" of the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeType {
    /// Baseline; never the subject of a change event
    #[default]
    Normal,
    MonetaryTightening,
    MonetaryEasing,
    InflationSurge,
    Recession,
    Expansion,
    MarketStress,
    GeopoliticalShock,
}

impl RegimeType {
    /// Every non-default regime, in classification order
    pub const CANDIDATES: [RegimeType; 7] = [
        RegimeType::MonetaryTightening,
        RegimeType::MonetaryEasing,
        RegimeType::InflationSurge,
        RegimeType::Recession,
        RegimeType::Expansion,
        RegimeType::MarketStress,
        RegimeType::GeopoliticalShock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeType::Normal => "NORMAL",
            RegimeType::MonetaryTightening => "MONETARY_TIGHTENING",
            RegimeType::MonetaryEasing => "MONETARY_EASING",
            RegimeType::InflationSurge => "INFLATION_SURGE",
            RegimeType::Recession => "RECESSION",
            RegimeType::Expansion => "EXPANSION",
            RegimeType::MarketStress => "MARKET_STRESS",
            RegimeType::GeopoliticalShock => "GEOPOLITICAL_SHOCK",
        }
    }
}

impl fmt::Display for RegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted once when the detector commits to a new regime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeChangeEvent {
    pub id: RegimeEventId,
    pub timestamp: DateTime<Utc>,
    pub regime_type: RegimeType,
    pub previous_regime: RegimeType,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Signal and indicator contributions behind the decision
    pub evidence: BTreeMap<String, f64>,
}

/// A news item pushed by an ingestion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub headline: String,
    #[serde(default)]
    pub content: String,
    /// Editorial weight in [0, 1]
    pub priority: f64,
    #[serde(default)]
    pub source: String,
}

impl NewsEvent {
    pub fn new(headline: impl Into<String>, priority: f64) -> Self {
        Self {
            headline: headline.into(),
            content: String::new(),
            priority,
            source: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime_serializes_screaming_case() {
        let json = serde_json::to_string(&RegimeType::MonetaryTightening).unwrap();
        assert_eq!(json, "\"MONETARY_TIGHTENING\"");
        assert_eq!(RegimeType::MonetaryTightening.to_string(), "MONETARY_TIGHTENING");
    }

    #[test]
    fn test_candidates_exclude_normal() {
        assert!(!RegimeType::CANDIDATES.contains(&RegimeType::Normal));
    }
}
