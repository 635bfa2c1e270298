//! Trust enrichment - how far a turn's result can be relied on

use serde::{Deserialize, Serialize};

use crate::gravity::fabric::GravityCorrection;
use crate::simulation::tagging::SymbolicTag;
use crate::world::state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLabel {
    Trusted,
    Moderate,
    Untrusted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMetadata {
    /// 1.0 when the turn's numbers are purely causal
    pub confidence: f64,
    /// Pressure from destabilising overlays (0-1)
    pub fragility: f64,
    pub label: TrustLabel,
}

/// Capability: attach trust metadata to a finished turn
pub trait TrustEnricher: Send + Sync + std::fmt::Debug {
    fn enrich(
        &self,
        state: &WorldState,
        corrections: &[GravityCorrection],
        tag: Option<&SymbolicTag>,
    ) -> Option<TrustMetadata>;
}

/// Overlays that make a state fragile
const FRAGILE_OVERLAYS: &[&str] = &["despair", "fear", "rage"];

/// Default enricher: confidence falls as gravity influence rises
#[derive(Debug, Clone, Copy)]
pub struct InfluenceTrustEnricher {
    pub trusted_confidence: f64,
    pub untrusted_confidence: f64,
    pub fragile_above: f64,
}

impl Default for InfluenceTrustEnricher {
    fn default() -> Self {
        Self {
            trusted_confidence: 0.75,
            untrusted_confidence: 0.4,
            fragile_above: 0.75,
        }
    }
}

impl TrustEnricher for InfluenceTrustEnricher {
    fn enrich(
        &self,
        state: &WorldState,
        corrections: &[GravityCorrection],
        _tag: Option<&SymbolicTag>,
    ) -> Option<TrustMetadata> {
        let confidence = if corrections.is_empty() {
            1.0
        } else {
            let mean = corrections
                .iter()
                .map(|c| c.cumulative_influence)
                .sum::<f64>()
                / corrections.len() as f64;
            (1.0 - mean).clamp(0.0, 1.0)
        };

        let fragile: Vec<f64> = FRAGILE_OVERLAYS
            .iter()
            .filter_map(|name| state.overlay(name))
            .collect();
        let fragility = if fragile.is_empty() {
            0.0
        } else {
            fragile.iter().sum::<f64>() / fragile.len() as f64
        };

        let label = if confidence < self.untrusted_confidence || fragility > self.fragile_above {
            TrustLabel::Untrusted
        } else if confidence >= self.trusted_confidence && fragility < 0.5 {
            TrustLabel::Trusted
        } else {
            TrustLabel::Moderate
        };

        Some(TrustMetadata {
            confidence,
            fragility,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correction(influence: f64) -> GravityCorrection {
        GravityCorrection {
            variable: "gdp_growth".into(),
            causal_delta: 0.0,
            gravity_delta: 0.0,
            cumulative_influence: influence,
        }
    }

    #[test]
    fn test_calm_causal_turn_is_trusted() {
        let state = WorldState::with_default_overlays("t")
            .with_overlay("fear", 0.1)
            .and_then(|s| s.with_overlay("despair", 0.1))
            .and_then(|s| s.with_overlay("rage", 0.1))
            .unwrap();
        let meta = InfluenceTrustEnricher::default()
            .enrich(&state, &[correction(0.1)], None)
            .unwrap();
        assert!((meta.confidence - 0.9).abs() < 1e-12);
        assert_eq!(meta.label, TrustLabel::Trusted);
    }

    #[test]
    fn test_gravity_heavy_turn_is_untrusted() {
        let state = WorldState::with_default_overlays("t");
        let meta = InfluenceTrustEnricher::default()
            .enrich(&state, &[correction(0.9), correction(0.8)], None)
            .unwrap();
        assert_eq!(meta.label, TrustLabel::Untrusted);
    }

    #[test]
    fn test_neutral_state_is_moderate() {
        let state = WorldState::with_default_overlays("t");
        let meta = InfluenceTrustEnricher::default()
            .enrich(&state, &[], None)
            .unwrap();
        assert_eq!(meta.confidence, 1.0);
        assert_eq!(meta.fragility, 0.5);
        assert_eq!(meta.label, TrustLabel::Moderate);
    }
}
