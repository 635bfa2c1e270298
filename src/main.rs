//! Pulse - Demo Entry Point
//!
//! Runs a scripted forward simulation, a counterfactual fork, and one pass
//! of the regime/retrodiction pipeline. Set `PULSE_CONFIG` to a TOML file
//! to override the defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use pulse::core::config::PulseConfig;
use pulse::core::error::Result;
use pulse::core::logging::init_tracing;
use pulse::regime::types::NewsEvent;
use pulse::retrodiction::pipeline::RetrodictionPipeline;
use pulse::simulation::counterfactual::Intervention;
use pulse::simulation::forward::ForwardOptions;
use pulse::simulation::turn::Simulator;
use pulse::world::state::WorldState;

fn main() -> Result<()> {
    init_tracing("pulse=info");
    tracing::info!("Pulse starting...");

    let config = match std::env::var_os("PULSE_CONFIG") {
        Some(path) => PulseConfig::load(&PathBuf::from(path))?,
        None => PulseConfig::default(),
    };

    let initial = WorldState::with_default_overlays("demo")
        .with_overlay("hope", 0.6)?
        .with_overlay("despair", 0.2)?
        .with_variable("gdp_growth", 0.02)?
        .with_variable("unemployment", 0.05)?
        .with_variable("inflation", 0.03)?
        .with_variable("interest_rate", 0.04)?
        .with_variable("consumer_confidence", 0.5)?;

    // Forward run
    let mut simulator = Simulator::new(&config)?;
    let mut state = initial.snapshot();
    let run = simulator.simulate_forward(&mut state, 12, &ForwardOptions::default());

    println!("\n=== FORWARD RUN ===");
    for result in &run.results {
        let tag = result
            .symbolic_tag
            .as_ref()
            .map(|t| t.label.as_str())
            .unwrap_or("-");
        println!(
            "turn {:>3}  gdp {:>8.4}  unemployment {:>7.4}  hope {:.3}  tag {}",
            result.turn,
            result.variables_snapshot.get("gdp_growth").copied().unwrap_or(0.0),
            result.variables_snapshot.get("unemployment").copied().unwrap_or(0.0),
            result.overlays_snapshot.get("hope").copied().unwrap_or(0.0),
            tag,
        );
    }
    println!("stop: {:?}, overrides: {}", run.stop, run.triggers.len());

    // Counterfactual
    let mut interventions = BTreeMap::new();
    interventions.insert("hope".to_string(), Intervention::Set(0.8));
    let cf = simulator.simulate_counterfactual(&initial, &interventions, 5)?;

    println!("\n=== COUNTERFACTUAL (hope -> 0.8) ===");
    for record in &cf.divergence {
        println!("turn {}  max divergence {:.5}", record.turn, record.max_abs());
    }
    println!("final max divergence {:.5}", cf.final_divergence.max_abs());

    // Regime pipeline
    let mut pipeline = RetrodictionPipeline::new(&config, simulator, state)?;
    let producer = pipeline.producer();
    for step in 0..12 {
        let mut data = BTreeMap::new();
        data.insert("interest_rate".to_string(), 0.04 + 0.0025 * step as f64);
        data.insert("inflation".to_string(), 0.03);
        producer.push_economic(data)?;
    }
    producer.push_news(
        NewsEvent::new("Central bank signals further rate hike", 0.8).with_source("demo"),
    )?;

    println!("\n=== RETRODICTION ===");
    for report in pipeline.drain_stream() {
        println!(
            "snapshot {} ({:?}, {:?})",
            report.snapshot.id, report.snapshot.regime_type, report.snapshot.priority
        );
        for result in &report.results {
            println!("  {:<24} effects {:?}", result.scenario_name, result.effects);
        }
    }

    if let Some(stats) = pipeline.shutdown() {
        tracing::info!(written = stats.written, failed = stats.failed, "Pulse finished");
    }
    Ok(())
}
