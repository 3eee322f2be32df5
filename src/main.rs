use anyhow::{bail, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use crossroads::simulation::{
    ApproachId, IntersectionConfig, SimulationSettings, SimulatorEngine,
};

#[derive(Parser)]
#[command(name = "crossroads")]
#[command(about = "Headless four-way intersection simulation")]
struct Cli {
    /// Simulated seconds to run
    #[arg(long, default_value = "120")]
    duration: f64,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    time_step: f64,

    /// Vehicles per second spawned on every approach
    #[arg(long, default_value = "0.5")]
    traffic_rate: f64,

    /// North-south green time in seconds
    #[arg(long, default_value = "10")]
    ns_green: f64,

    /// East-west green time in seconds
    #[arg(long, default_value = "10")]
    ew_green: f64,

    /// Drive the lights from the four default signal groups instead of the fixed cycle
    #[arg(long)]
    signal_groups: bool,

    /// Seconds of simulated time between progress lines
    #[arg(long, default_value = "10")]
    report_every: f64,

    /// Print the final snapshot as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !cli.time_step.is_finite() || cli.time_step <= 0.0 {
        bail!("--time-step must be a positive number, got {}", cli.time_step);
    }

    let config = if cli.signal_groups {
        IntersectionConfig::with_default_signal_groups()
    } else {
        IntersectionConfig::default()
    };
    let settings = SimulationSettings {
        traffic_rate: cli.traffic_rate,
        ns_green_seconds: cli.ns_green,
        ew_green_seconds: cli.ew_green,
    };

    run_headless(SimulatorEngine::from_settings(config, &settings), &cli)
}

/// Run the simulation without any UI, logging progress as it goes
fn run_headless(mut engine: SimulatorEngine, cli: &Cli) -> Result<()> {
    info!(
        "Running {}s at {}s per tick with the {} controller",
        cli.duration,
        cli.time_step,
        engine.controller_name()
    );

    let slice = if cli.report_every > 0.0 {
        cli.report_every
    } else {
        cli.duration
    };

    engine.reset();
    engine.start();
    while engine.current_time() < cli.duration {
        let remaining = cli.duration - engine.current_time();
        engine.advance(slice.min(remaining), cli.time_step);

        let metrics = engine.metrics();
        info!(
            "t={:.1}s generated={} crossed={} queued={} mode={:?}",
            metrics.total_time,
            metrics.vehicles_generated,
            metrics.vehicles_crossed,
            metrics.total_queue_length,
            engine.control_mode()
        );
    }
    engine.stop();

    let metrics = engine.metrics();
    info!("=== SIMULATION COMPLETE ===");
    info!("Vehicles generated: {}", metrics.vehicles_generated);
    info!("Vehicles crossed: {}", metrics.vehicles_crossed);
    info!("Average wait: {:.2}s", metrics.average_wait_time);
    info!(
        "Queues: north={} east={} south={} west={} (total {})",
        metrics.queue_length(ApproachId::North),
        metrics.queue_length(ApproachId::East),
        metrics.queue_length(ApproachId::South),
        metrics.queue_length(ApproachId::West),
        metrics.total_queue_length
    );
    info!("Safety violations: {}", metrics.safety_violations);
    info!("Final control mode: {:?}", engine.control_mode());

    if cli.json {
        println!("{}", engine.snapshot_json()?);
    }

    Ok(())
}
