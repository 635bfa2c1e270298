//! Intervention scenarios, built from a regime -> templates table

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::regime::types::RegimeType;
use crate::retrodiction::snapshot::RetrodictionSnapshot;
use crate::simulation::counterfactual::Intervention;

/// One what-if to run against the causal model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionScenario {
    pub name: String,
    pub description: String,
    pub interventions: BTreeMap<String, Intervention>,
    pub target_variables: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl InterventionScenario {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            interventions: BTreeMap::new(),
            target_variables: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn intervene(mut self, name: impl Into<String>, intervention: Intervention) -> Self {
        self.interventions.insert(name.into(), intervention);
        self
    }

    pub fn target(mut self, variable: impl Into<String>) -> Self {
        self.target_variables.push(variable.into());
        self
    }
}

struct TemplateSpec {
    regime: RegimeType,
    name: &'static str,
    description: &'static str,
    interventions: &'static [(&'static str, Intervention)],
    targets: &'static [&'static str],
}

const MONETARY_TARGETS: &[&str] = &["inflation", "gdp_growth", "unemployment"];

const DEFAULT_TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        regime: RegimeType::MonetaryTightening,
        name: "rate_hike_baseline",
        description: "Raise the policy rate by 25bp",
        interventions: &[("interest_rate", Intervention::Delta(0.0025))],
        targets: MONETARY_TARGETS,
    },
    TemplateSpec {
        regime: RegimeType::MonetaryTightening,
        name: "aggressive_tightening",
        description: "Raise the policy rate by 75bp",
        interventions: &[("interest_rate", Intervention::Delta(0.0075))],
        targets: MONETARY_TARGETS,
    },
    TemplateSpec {
        regime: RegimeType::MonetaryEasing,
        name: "rate_cut_baseline",
        description: "Cut the policy rate by 25bp",
        interventions: &[("interest_rate", Intervention::Delta(-0.0025))],
        targets: MONETARY_TARGETS,
    },
    TemplateSpec {
        regime: RegimeType::MonetaryEasing,
        name: "emergency_easing",
        description: "Cut the policy rate by 75bp",
        interventions: &[("interest_rate", Intervention::Delta(-0.0075))],
        targets: MONETARY_TARGETS,
    },
    TemplateSpec {
        regime: RegimeType::InflationSurge,
        name: "inflation_persistence",
        description: "Inflation runs a point hotter",
        interventions: &[("inflation", Intervention::Delta(0.01))],
        targets: &["inflation", "gdp_growth", "consumer_confidence"],
    },
    TemplateSpec {
        regime: RegimeType::InflationSurge,
        name: "policy_response",
        description: "Hotter inflation met by a 50bp hike",
        interventions: &[
            ("inflation", Intervention::Delta(0.01)),
            ("interest_rate", Intervention::Delta(0.005)),
        ],
        targets: &["inflation", "gdp_growth", "unemployment"],
    },
    TemplateSpec {
        regime: RegimeType::Recession,
        name: "demand_shock",
        description: "Output falls a point and despair rises",
        interventions: &[
            ("gdp_growth", Intervention::Delta(-0.01)),
            ("despair", Intervention::Delta(0.1)),
        ],
        targets: &["gdp_growth", "unemployment"],
    },
    TemplateSpec {
        regime: RegimeType::Recession,
        name: "stimulus",
        description: "50bp cut with a lift in hope",
        interventions: &[
            ("interest_rate", Intervention::Delta(-0.005)),
            ("hope", Intervention::Delta(0.1)),
        ],
        targets: &["gdp_growth", "unemployment", "inflation"],
    },
    TemplateSpec {
        regime: RegimeType::Expansion,
        name: "overheating",
        description: "Growth and inflation both run hot",
        interventions: &[
            ("gdp_growth", Intervention::Delta(0.01)),
            ("inflation", Intervention::Delta(0.005)),
        ],
        targets: &["inflation", "gdp_growth", "unemployment"],
    },
    TemplateSpec {
        regime: RegimeType::MarketStress,
        name: "confidence_shock",
        description: "Fear jumps and trust erodes",
        interventions: &[
            ("fear", Intervention::Delta(0.2)),
            ("trust", Intervention::Delta(-0.1)),
        ],
        targets: &["consumer_confidence", "gdp_growth"],
    },
    TemplateSpec {
        regime: RegimeType::GeopoliticalShock,
        name: "supply_shock",
        description: "Supply disruption lifts prices and fear",
        interventions: &[
            ("inflation", Intervention::Delta(0.01)),
            ("fear", Intervention::Delta(0.15)),
        ],
        targets: &["inflation", "gdp_growth", "consumer_confidence"],
    },
];

/// Regime type -> scenario prototypes
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    templates: BTreeMap<RegimeType, Vec<InterventionScenario>>,
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for spec in DEFAULT_TEMPLATES {
            let mut scenario = InterventionScenario::new(spec.name, spec.description);
            for (name, intervention) in spec.interventions {
                scenario = scenario.intervene(*name, *intervention);
            }
            for target in spec.targets {
                scenario = scenario.target(*target);
            }
            catalog.register(spec.regime, scenario);
        }
        catalog
    }
}

impl ScenarioCatalog {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Add a template for `regime`
    pub fn register(&mut self, regime: RegimeType, template: InterventionScenario) {
        self.templates.entry(regime).or_default().push(template);
    }

    pub fn templates_for(&self, regime: RegimeType) -> &[InterventionScenario] {
        self.templates.get(&regime).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn regimes(&self) -> impl Iterator<Item = RegimeType> + '_ {
        self.templates.keys().copied()
    }

    /// Fresh scenarios for `regime`, tagged with their origin
    pub fn build(
        &self,
        regime: RegimeType,
        snapshot: Option<&RetrodictionSnapshot>,
    ) -> Vec<InterventionScenario> {
        self.templates_for(regime)
            .iter()
            .map(|template| {
                let mut scenario = template.clone();
                scenario
                    .metadata
                    .insert("regime".to_string(), regime.to_string());
                if let Some(snapshot) = snapshot {
                    scenario
                        .metadata
                        .insert("snapshot_id".to_string(), snapshot.id.to_string());
                }
                scenario
            })
            .collect()
    }
}
