//! `refit` CLI: scenario runs, replay import/export, refit metrics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use detector_models::{DetectorConfig, DetectorSetup};
use rayon::prelude::*;
use refit_core::{RefitMetrics, Refitter, RefitterConfig};
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use sim::SimulatedTrack;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "refit", about = "Track refitter CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, refit every track and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Number of particles to shoot
        #[arg(long, default_value_t = 1000)]
        tracks: usize,
        /// Refitter configuration JSON, replacing the scenario's
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the simulated tracks
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Refit the tracks of a previously recorded log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        /// Refitter configuration JSON, replacing the recorded one
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            tracks,
            config,
            output,
            save_replay: save_path,
        } => {
            run_scenario(
                scenario,
                seed,
                tracks,
                config.as_deref(),
                output.as_deref(),
                save_path.as_deref(),
            )?;
        }
        Commands::Replay {
            input,
            config,
            output,
        } => {
            run_replay(&input, config.as_deref(), output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<RefitterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing refitter config {}", path.display()))?;
    Ok(config)
}

/// Refit every track in parallel and fold the outcomes.
fn refit_all(
    config: RefitterConfig,
    detector: DetectorConfig,
    tracks: &[SimulatedTrack],
) -> Result<RefitMetrics> {
    let setup = DetectorSetup::new(detector);
    let mut refitter = Refitter::new(config);
    refitter.set_services(&setup)?;
    let refitter = &refitter;

    let partials: Vec<RefitMetrics> = tracks
        .par_iter()
        .map(|sim_track| -> Result<RefitMetrics> {
            let hits = refitter.select_hits(&sim_track.track)?;
            let result = refitter.try_refit(&sim_track.track, &hits);
            let mut m = RefitMetrics::default();
            m.accumulate(&result, Some(sim_track.particle.pt()));
            Ok(m)
        })
        .collect::<Result<_>>()?;

    let mut metrics = RefitMetrics::default();
    for m in &partials {
        metrics.merge(m);
    }
    Ok(metrics)
}

fn report(metrics: &RefitMetrics, elapsed: f64) {
    println!(
        "Refitted {}/{} tracks ({:.1}%), mean chi2/ndof={:.3}, pT resolution={:.4}, elapsed={:.2}s",
        metrics.n_refitted,
        metrics.n_tracks,
        100.0 * metrics.efficiency(),
        metrics.mean_chi2_per_ndof(),
        metrics.rms_relative_pt(),
        elapsed,
    );
    for (reason, count) in &metrics.failures {
        println!("  failed: {reason} x{count}");
    }
}

fn write_metrics(
    path: &Path,
    scenario: &str,
    seed: u64,
    metrics: &RefitMetrics,
    elapsed: f64,
) -> Result<()> {
    let json = serde_json::json!({
        "scenario": scenario,
        "seed": seed,
        "elapsed_s": elapsed,
        "efficiency": metrics.efficiency(),
        "mean_chi2_per_ndof": metrics.mean_chi2_per_ndof(),
        "rms_relative_pt": metrics.rms_relative_pt(),
        "metrics": metrics,
    });
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    println!("Metrics saved to {}", path.display());
    Ok(())
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    n_tracks: usize,
    config_path: Option<&Path>,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let mut scenario = Scenario::build(kind, seed, n_tracks);
    if let Some(path) = config_path {
        scenario.refitter = load_config(path)?;
    }
    let setup = DetectorSetup::default();

    println!(
        "Running scenario '{}' (seed={}, particles={})...",
        scenario.name, seed, n_tracks
    );
    let tracks = scenario.generate(&setup);
    info!(tracks = tracks.len(), "simulation done");

    let start = std::time::Instant::now();
    let metrics = refit_all(scenario.refitter.clone(), *setup.config(), &tracks)?;
    let elapsed = start.elapsed().as_secs_f64();
    report(&metrics, elapsed);

    if let Some(rpath) = replay_path {
        let log = ReplayLog {
            scenario_name: scenario.name.clone(),
            seed,
            refitter: scenario.refitter.clone(),
            detector: *setup.config(),
            tracks,
        };
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        write_metrics(opath, &scenario.name, seed, &metrics, elapsed)?;
    }

    Ok(())
}

fn run_replay(input: &Path, config_path: Option<&Path>, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)?;
    println!(
        "Replaying '{}' ({} tracks)...",
        log.scenario_name,
        log.tracks.len()
    );
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => log.refitter.clone(),
    };

    let start = std::time::Instant::now();
    let metrics = refit_all(config, log.detector, &log.tracks)?;
    let elapsed = start.elapsed().as_secs_f64();
    report(&metrics, elapsed);

    if let Some(opath) = output_path {
        write_metrics(opath, &log.scenario_name, log.seed, &metrics, elapsed)?;
    }

    Ok(())
}
