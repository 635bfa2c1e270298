//! Symbolic tagging - a short narrative label for each turn
//!
//! Taggers are selected by name from a static registration table. Unknown
//! names degrade to the heuristic tagger.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::simulation::result::TurnDeltas;
use crate::world::state::WorldState;

/// Label attached to a TurnResult
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicTag {
    pub label: String,
    /// Overlay that drove the label, if any
    pub overlay: Option<String>,
    /// Strength of the driving signal (0-1)
    pub intensity: f64,
}

/// Capability: label a turn from its end state and deltas
pub trait SymbolicTagger: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn tag(&self, state: &WorldState, deltas: &TurnDeltas) -> Option<SymbolicTag>;
}

// ============================================================================
// Heuristic tagger
// ============================================================================

/// Overlay -> label for the dominant overlay
const OVERLAY_LABELS: &[(&str, &str)] = &[
    ("despair", "Collapse Risk"),
    ("fear", "Fear Spiral"),
    ("hope", "Hope Surge"),
    ("rage", "Unrest"),
    ("trust", "Stabilization"),
];

/// Below this no overlay is considered dominant
const QUIET_LEVEL: f64 = 0.3;

/// Labels the turn after whichever overlay is currently highest
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTagger;

impl SymbolicTagger for HeuristicTagger {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn tag(&self, state: &WorldState, _deltas: &TurnDeltas) -> Option<SymbolicTag> {
        let (overlay, value) = state
            .overlays()
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))?;

        if *value < QUIET_LEVEL {
            return Some(SymbolicTag {
                label: "Quiet".to_string(),
                overlay: None,
                intensity: *value,
            });
        }

        let label = OVERLAY_LABELS
            .iter()
            .find(|(name, _)| *name == overlay.as_str())
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| format!("{} Dominant", capitalize(overlay)));

        Some(SymbolicTag {
            label,
            overlay: Some(overlay.clone()),
            intensity: *value,
        })
    }
}

// ============================================================================
// Trend tagger
// ============================================================================

/// Labels the turn after the overlay that moved the most
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendTagger;

impl SymbolicTagger for TrendTagger {
    fn name(&self) -> &str {
        "trend"
    }

    fn tag(&self, _state: &WorldState, deltas: &TurnDeltas) -> Option<SymbolicTag> {
        let Some((overlay, delta)) = deltas.dominant_overlay() else {
            return Some(SymbolicTag {
                label: "Steady".to_string(),
                overlay: None,
                intensity: 0.0,
            });
        };
        let direction = if delta > 0.0 { "Rising" } else { "Fading" };
        Some(SymbolicTag {
            label: format!("{} {}", capitalize(overlay), direction),
            overlay: Some(overlay.to_string()),
            intensity: delta.abs().min(1.0),
        })
    }
}

// ============================================================================
// Registration
// ============================================================================

type TaggerCtor = fn() -> Arc<dyn SymbolicTagger>;

static TAGGERS: &[(&str, TaggerCtor)] = &[("heuristic", heuristic), ("trend", trend)];

fn heuristic() -> Arc<dyn SymbolicTagger> {
    Arc::new(HeuristicTagger)
}

fn trend() -> Arc<dyn SymbolicTagger> {
    Arc::new(TrendTagger)
}

/// Names accepted by `tagger_from_name`
pub fn registered_taggers() -> impl Iterator<Item = &'static str> {
    TAGGERS.iter().map(|(name, _)| *name)
}

/// Build a registered tagger; unknown names fall back to the heuristic one
pub fn tagger_from_name(name: &str) -> Arc<dyn SymbolicTagger> {
    match TAGGERS.iter().find(|(n, _)| *n == name) {
        Some((_, ctor)) => ctor(),
        None => {
            tracing::warn!(tagger = name, "Unknown symbolic tagger; using heuristic");
            Arc::new(HeuristicTagger)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
