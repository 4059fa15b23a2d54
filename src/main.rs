//! CSI motion classifier CLI
//!
//! Trains, evaluates and serves a motion/position classifier over Wi-Fi CSI
//! amplitude and phase statistics.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use csi_motion_classifier::{
    artifacts::ArtifactStore,
    audit::{create_shared_log_with_persistence, SharedRunLog},
    config::{Config, ShortSamplePolicy},
    data::{LoadSummary, SampleLoader},
    inference::{predict_position, PredictRequest},
    model::ClassificationReport,
    training::{self, SpotCheck, TrainingOutcome},
    InferenceContext, PipelineError, VERSION,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csi-motion")]
#[command(version = VERSION)]
#[command(about = "Motion and position classification from Wi-Fi CSI statistics", long_about = None)]
struct Cli {
    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier and save its artifacts
    Train {
        /// CSV file with sample_id, timestamp, the four CSI statistics and label
        #[arg(long)]
        data: PathBuf,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Number of held-out rows to print
        #[arg(long)]
        spot_checks: Option<usize>,

        /// Save artifacts here instead of the configured directory
        #[arg(long)]
        artifacts: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Evaluate saved artifacts on another labeled file
    Evaluate {
        #[arg(long)]
        data: PathBuf,

        #[arg(long)]
        artifacts: Option<PathBuf>,

        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Classify a single reading
    Predict {
        #[arg(long, allow_hyphen_values = true)]
        amplitude_mean: String,

        #[arg(long, allow_hyphen_values = true)]
        amplitude_std: String,

        #[arg(long, allow_hyphen_values = true)]
        phase_mean: String,

        #[arg(long, allow_hyphen_values = true)]
        phase_std: String,

        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Serve predictions over HTTP
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,

        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show run statistics and the current artifact set
    Status,

    /// Show configuration
    Config,
}

/// Per-run overrides of configuration values.
#[derive(Args, Default)]
struct Overrides {
    #[arg(long)]
    window_len: Option<usize>,

    #[arg(long)]
    stride: Option<usize>,

    #[arg(long)]
    noise_sigma: Option<f64>,

    #[arg(long)]
    noise_seed: Option<u64>,

    /// `drop` or `fail`
    #[arg(long)]
    short_samples: Option<ShortSamplePolicy>,

    #[arg(long)]
    test_fraction: Option<f64>,

    #[arg(long)]
    split_seed: Option<u64>,

    #[arg(long)]
    n_trees: Option<u16>,

    #[arg(long)]
    max_depth: Option<u16>,

    #[arg(long)]
    forest_seed: Option<u64>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        let w = &mut config.windowing;
        if let Some(v) = self.window_len {
            w.window_len = v;
        }
        if let Some(v) = self.stride {
            w.stride = v;
        }
        if let Some(v) = self.noise_sigma {
            w.noise_sigma = v;
        }
        if let Some(v) = self.noise_seed {
            w.noise_seed = v;
        }
        if let Some(v) = self.short_samples {
            w.short_samples = v;
        }

        let t = &mut config.training;
        if let Some(v) = self.test_fraction {
            t.test_fraction = v;
        }
        if let Some(v) = self.split_seed {
            t.split_seed = v;
        }
        if let Some(v) = self.n_trees {
            t.n_trees = v;
        }
        if self.max_depth.is_some() {
            t.max_depth = self.max_depth;
        }
        if let Some(v) = self.forest_seed {
            t.forest_seed = v;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    let result = match cli.command {
        Commands::Train {
            data,
            report,
            spot_checks,
            artifacts,
            overrides,
        } => cmd_train(&config_path, &data, report, spot_checks, artifacts, &overrides),
        Commands::Evaluate {
            data,
            artifacts,
            report,
        } => cmd_evaluate(&config_path, &data, artifacts, report),
        Commands::Predict {
            amplitude_mean,
            amplitude_std,
            phase_mean,
            phase_std,
            artifacts,
        } => cmd_predict(
            &config_path,
            PredictRequest {
                amplitude_mean: Some(amplitude_mean.into()),
                amplitude_std: Some(amplitude_std.into()),
                phase_mean: Some(phase_mean.into()),
                phase_std: Some(phase_std.into()),
            },
            artifacts,
        ),
        #[cfg(feature = "server")]
        Commands::Serve { port, artifacts } => cmd_serve(&config_path, port, artifacts),
        Commands::Status => cmd_status(&config_path),
        Commands::Config => cmd_config(&config_path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load_from(path).with_context(|| format!("loading configuration from {path:?}"))
}

fn open_run_log(config: &Config) -> SharedRunLog {
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    create_shared_log_with_persistence(config.data_path.join("run_log.json"))
}

fn save_run_log(log: &SharedRunLog) {
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save run log: {e}");
    }
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report to {path:?}"))?;
    println!("Report written to {path:?}");
    Ok(())
}

#[derive(Serialize)]
struct TrainingReport<'a> {
    run_id: String,
    summary: &'a training::DatasetSummary,
    report: &'a ClassificationReport,
    spot_checks: &'a [SpotCheck],
}

fn cmd_train(
    config_path: &Path,
    data: &Path,
    report_path: Option<PathBuf>,
    spot_checks: Option<usize>,
    artifacts: Option<PathBuf>,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    if let Some(dir) = artifacts {
        config.artifacts_path = dir;
    }
    config.validate()?;

    let run_log = open_run_log(&config);

    println!("CSI Motion Classifier v{VERSION}");
    println!();

    let samples = SampleLoader::new().load_path(data)?;
    let loaded = LoadSummary::of(&samples);
    run_log.record_load(loaded.rows as u64, loaded.samples as u64);

    println!("Loaded {} readings in {} samples", loaded.rows, loaded.samples);
    for (label, count) in &loaded.samples_per_label {
        println!("  {label}: {count} sample(s)");
    }
    println!(
        "Window length {}, stride {}, jitter sigma {}",
        config.windowing.window_len, config.windowing.stride, config.windowing.noise_sigma
    );
    println!(
        "Random forest: {} trees, seed {}",
        config.training.n_trees, config.training.forest_seed
    );
    println!();

    let outcome: TrainingOutcome = training::train(&samples, &config).context("training failed")?;
    let summary = &outcome.summary;
    run_log.record_segmentation(summary.windows as u64, summary.dropped.len() as u64);
    run_log.record_training_run();

    for dropped in &summary.dropped {
        println!(
            "Dropped sample {} ({} readings, window needs {})",
            dropped.sample_id, dropped.len, config.windowing.window_len
        );
    }
    println!(
        "Windows: {} ({} with jittered copies), train {} / test {}",
        summary.windows, summary.augmented_windows, summary.train_rows, summary.test_rows
    );
    println!();
    println!("{}", outcome.report);

    let n_checks = spot_checks.unwrap_or(config.training.spot_checks);
    let checks = outcome.spot_checks(n_checks, config.training.split_seed);
    if !checks.is_empty() {
        println!("Spot checks:");
        for check in &checks {
            println!(
                "  test row {:>4}: true {:<12} predicted {}",
                check.row, check.truth, check.predicted
            );
        }
        println!();
    }

    let store = ArtifactStore::new(&config.artifacts_path);
    let manifest = store.save(&outcome.context, outcome.run_id)?;
    println!("Artifacts saved to {:?}", store.dir());
    println!("  Run id: {}", manifest.run_id);
    println!("  Fingerprint: {}", manifest.fingerprint);

    if let Some(path) = report_path {
        write_report(
            &path,
            &TrainingReport {
                run_id: outcome.run_id.to_string(),
                summary,
                report: &outcome.report,
                spot_checks: &checks,
            },
        )?;
    }

    save_run_log(&run_log);
    Ok(())
}

fn cmd_evaluate(
    config_path: &Path,
    data: &Path,
    artifacts: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let run_log = open_run_log(&config);

    let store = ArtifactStore::new(artifacts.unwrap_or_else(|| config.artifacts_path.clone()));
    let context: InferenceContext = store.load()?;

    let samples = SampleLoader::new().load_path(data)?;
    let loaded = LoadSummary::of(&samples);
    run_log.record_load(loaded.rows as u64, loaded.samples as u64);

    let outcome = training::evaluate(&context, &samples, &config.windowing)?;
    run_log.record_segmentation(outcome.windows as u64, outcome.dropped.len() as u64);
    run_log.record_evaluation();

    println!(
        "Evaluated {} windows from {} samples ({} dropped)",
        outcome.windows,
        loaded.samples,
        outcome.dropped.len()
    );
    println!();
    println!("{}", outcome.report);

    if let Some(path) = report_path {
        write_report(&path, &outcome)?;
    }

    save_run_log(&run_log);
    Ok(())
}

fn cmd_predict(
    config_path: &Path,
    request: PredictRequest,
    artifacts: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let run_log = open_run_log(&config);

    let store = ArtifactStore::new(artifacts.unwrap_or_else(|| config.artifacts_path.clone()));
    let context: Option<InferenceContext> = match store.load() {
        Ok(context) => Some(context),
        Err(PipelineError::NotTrained(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let response = predict_position(context.as_ref(), &request)?;
    run_log.record_prediction();
    println!("{}", response.label);

    save_run_log(&run_log);
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(config_path: &Path, port: u16, artifacts: Option<PathBuf>) -> anyhow::Result<()> {
    use csi_motion_classifier::server::{run, ServerConfig};

    let config = load_config(config_path)?;
    let run_log = open_run_log(&config);
    let server_config = ServerConfig::new(
        port,
        artifacts.unwrap_or_else(|| config.artifacts_path.clone()),
        run_log.clone(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Serving predictions on http://{addr}");
        println!("Press Ctrl+C to stop.");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        anyhow::Ok(())
    })?;

    println!();
    println!("{}", run_log.summary());
    save_run_log(&run_log);
    Ok(())
}

fn cmd_status(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    println!("CSI Motion Classifier Status");
    println!("============================");
    println!();

    let store = ArtifactStore::new(&config.artifacts_path);
    match store.manifest() {
        Ok(manifest) => {
            println!("Artifact set: {:?}", store.dir());
            println!("  Run id: {}", manifest.run_id);
            println!("  Created: {}", manifest.created_at.to_rfc3339());
            println!(
                "  Producer: {} {}",
                manifest.producer, manifest.producer_version
            );
            if let Some(host) = &manifest.host {
                println!("  Host: {host}");
            }
            println!(
                "  Window length: {} ({} features)",
                manifest.window_len, manifest.n_features
            );
            println!("  Classes: {}", manifest.classes.join(", "));
            println!("  Fingerprint: {}", manifest.fingerprint);
        }
        Err(PipelineError::NotTrained(_)) => {
            println!("No trained artifact set in {:?}.", store.dir());
            println!("Run 'csi-motion train --data <csv>' to create one.");
        }
        Err(e) => return Err(e.into()),
    }
    println!();

    let run_log_path = config.data_path.join("run_log.json");
    if run_log_path.exists() {
        let log = create_shared_log_with_persistence(run_log_path);
        println!("{}", log.summary());
    } else {
        println!("No previous run data found.");
    }
    Ok(())
}

fn cmd_config(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
