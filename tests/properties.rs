//! Property tests for the kernel invariants
//!
//! Overlay bounds, finite variables, capped gravity, bounded regime
//! confidence, and seeded determinism must hold for arbitrary inputs.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use pulse::core::config::PulseConfig;
use pulse::regime::detector::RegimeDetector;
use pulse::simulation::counterfactual::Intervention;
use pulse::simulation::forward::ForwardOptions;
use pulse::simulation::turn::Simulator;
use pulse::world::state::WorldState;

fn config(seed: u64, shock: f64) -> PulseConfig {
    let mut config = PulseConfig::default();
    config.simulation.seed = seed;
    config.simulation.shock_amplitude = shock;
    config.simulation.start_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single();
    config
}

fn world(overlays: &[f64], variables: &[f64]) -> WorldState {
    let overlay_names = ["hope", "despair", "rage", "fear", "trust"];
    let variable_names = ["gdp_growth", "unemployment", "inflation", "interest_rate"];
    let mut state = WorldState::new("prop");
    for (name, value) in overlay_names.iter().zip(overlays) {
        state = state.with_overlay(name, *value).unwrap();
    }
    for (name, value) in variable_names.iter().zip(variables) {
        state = state.with_variable(name, *value).unwrap();
    }
    state
}

fn overlays() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0_f64..=1.0, 5)
}

fn variables() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.2_f64..0.3, 4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_overlays_stay_bounded(
        overlays in overlays(),
        variables in variables(),
        seed in 0_u64..1_000,
        turns in 1_u64..30,
    ) {
        let mut sim = Simulator::new(&config(seed, 0.01)).unwrap();
        let mut state = world(&overlays, &variables);

        let run = sim.simulate_forward(&mut state, turns, &ForwardOptions::default());

        for result in &run.results {
            for value in result.overlays_snapshot.values() {
                prop_assert!((0.0..=1.0).contains(value));
            }
            for value in result.variables_snapshot.values() {
                prop_assert!(value.is_finite());
            }
        }
    }

    #[test]
    fn prop_gravity_never_exceeds_step_cap(
        overlays in overlays(),
        variables in variables(),
        turns in 1_u64..20,
    ) {
        let cfg = config(7, 0.0);
        let cap = cfg.gravity.max_step;
        let mut sim = Simulator::new(&cfg).unwrap();
        let mut state = world(&overlays, &variables);

        let run = sim.simulate_forward(&mut state, turns, &ForwardOptions::default());

        for result in &run.results {
            for correction in &result.gravity_corrections {
                prop_assert!(correction.gravity_delta.abs() <= cap + 1e-12);
                prop_assert!((0.0..=1.0).contains(&correction.cumulative_influence));
            }
        }
    }

    #[test]
    fn prop_same_seed_same_run(
        overlays in overlays(),
        variables in variables(),
        seed in 0_u64..1_000,
    ) {
        let cfg = config(seed, 0.005);
        let mut a_state = world(&overlays, &variables);
        let mut b_state = a_state.snapshot();

        let a = Simulator::new(&cfg).unwrap().simulate_forward(&mut a_state, 10, &ForwardOptions::default());
        let b = Simulator::new(&cfg).unwrap().simulate_forward(&mut b_state, 10, &ForwardOptions::default());

        prop_assert_eq!(a.results, b.results);
    }

    #[test]
    fn prop_first_divergence_is_the_intervention(
        overlays in overlays(),
        variables in variables(),
        target in 0.0_f64..=1.0,
        delta in -0.05_f64..0.05,
    ) {
        let state = world(&overlays, &variables);
        let mut interventions = BTreeMap::new();
        interventions.insert("fear".to_string(), Intervention::Set(target));
        interventions.insert("inflation".to_string(), Intervention::Delta(delta));

        let sim = Simulator::new(&config(3, 0.0)).unwrap();
        let run = sim.simulate_counterfactual(&state, &interventions, 3).unwrap();

        let zero = &run.divergence[0];
        prop_assert_eq!(zero.turn, 0);
        prop_assert!((zero.overlays["fear"] - (target - overlays[3])).abs() < 1e-12);
        prop_assert!((zero.variables["inflation"] - delta).abs() < 1e-12);
        for (name, value) in zero.overlays.iter().filter(|(k, _)| k.as_str() != "fear") {
            prop_assert_eq!(*value, 0.0, "{} moved", name);
        }
    }

    #[test]
    fn prop_regime_confidence_is_bounded(
        series in prop::collection::vec(
            (0.0_f64..0.2, -0.05_f64..0.05, -0.1_f64..0.1, 0.0_f64..0.15),
            1..40,
        ),
    ) {
        let mut detector = RegimeDetector::new(&PulseConfig::default().regime);
        for (rate, gdp, inflation, unemployment) in series {
            let mut data = BTreeMap::new();
            data.insert("interest_rate".to_string(), rate);
            data.insert("gdp_growth".to_string(), gdp);
            data.insert("inflation".to_string(), inflation);
            data.insert("unemployment".to_string(), unemployment);

            if let Some(event) = detector.ingest_economic_data(&data).unwrap() {
                prop_assert!(event.confidence > 0.0 && event.confidence <= 1.0);
                prop_assert_ne!(event.regime_type, event.previous_regime);
            }
            for confidence in detector.confidences().values() {
                prop_assert!((0.0..=1.0).contains(confidence));
            }
        }
    }
}
