use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use patient_flow::config::{self, InclusionPolicy, QueueConfig};
use patient_flow::queue::{
    start_periodic_refresh, JsonFileSink, JsonFileSource, LinearWaitModel, QueueOrchestrator,
    QueueService, TrainingDataGenerator, WaitTimeEstimator,
};

#[derive(Parser, Debug)]
#[command(
    name = "patient-flow",
    version,
    about = "Rank a waiting queue, predict waits and allocate doctors, nurses and rooms."
)]
struct Cli {
    /// Queue policy file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the queue once and print the result as JSON.
    Refresh {
        #[command(flatten)]
        source: SourceArgs,
        /// Evaluation time as epoch milliseconds (defaults to now).
        #[arg(long)]
        now: Option<i64>,
        /// Predict one patient at a time instead of on the blocking pool.
        #[arg(long)]
        sequential: bool,
        /// Print only id, priority score and predicted wait per patient.
        #[arg(long)]
        items: bool,
    },
    /// Refresh on a timer until interrupted, one JSON report per line.
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        /// Seconds between refreshes (overrides the config file).
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Emit synthetic training samples as JSON lines.
    Generate {
        #[arg(short = 'n', long, default_value_t = 1000)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Snapshot file with `facility` and `patients`.
    #[arg(short, long)]
    snapshot: PathBuf,
    /// Wait-time model weights (JSON). Overrides config and env.
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Write refreshed entries to this file.
    #[arg(short, long)]
    write_back: Option<PathBuf>,
    /// Include in-progress patients in the queue.
    #[arg(long)]
    include_in_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    patient_flow::init_tracing();
    let cli = Cli::parse();

    let mut queue_config = match &cli.config {
        Some(path) => QueueConfig::load(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?,
        None => QueueConfig::default().with_env_overrides(),
    };

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Command::Refresh {
            source,
            now,
            sequential,
            items,
        } => {
            let now = match now {
                Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
                    .with_context(|| format!("Invalid --now timestamp {ms}"))?,
                None => Utc::now(),
            };
            let service = build_service(&source, &mut queue_config);

            let report = if sequential {
                service.run_once(now)?
            } else {
                service.run_once_concurrent(now).await?
            };
            let json = if items {
                serde_json::to_string_pretty(&report.outcome.items())?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
        }
        Command::Watch { source, interval } => {
            if let Some(secs) = interval {
                queue_config.refresh_interval_secs = secs;
            }
            let service = Arc::new(build_service(&source, &mut queue_config));

            let handle = start_periodic_refresh(
                service,
                queue_config.refresh_interval(),
                |report| match serde_json::to_string(&report) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Cannot serialize refresh report"),
                },
            );

            tokio::signal::ctrl_c()
                .await
                .context("Cannot listen for Ctrl-C")?;
            handle.shutdown();
        }
        Command::Generate { count, seed } => {
            let mut generator = TrainingDataGenerator::new(seed);
            let now = Utc::now();
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for sample in generator.generate(count, now) {
                serde_json::to_writer(&mut out, &sample)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}

fn build_service(source: &SourceArgs, queue_config: &mut QueueConfig) -> QueueService {
    if let Some(model) = &source.model {
        queue_config.model_path = Some(model.clone());
    }
    if source.include_in_progress {
        queue_config.inclusion = InclusionPolicy::WaitingAndInProgress;
    }

    let estimator = build_estimator(queue_config);
    let orchestrator = QueueOrchestrator::new(queue_config, estimator);
    let snapshot = JsonFileSource::new(&source.snapshot);

    let service = QueueService::new(
        Box::new(snapshot.clone()),
        Box::new(snapshot),
        orchestrator,
        queue_config.inclusion,
    );

    match &source.write_back {
        Some(path) => service.with_sink(Box::new(JsonFileSink::new(path))),
        None => service,
    }
}

/// Model-backed estimator when weights resolve and load, fallback otherwise.
fn build_estimator(queue_config: &QueueConfig) -> WaitTimeEstimator {
    let Some(path) = config::resolve_model_path(queue_config) else {
        tracing::info!("No wait-time model configured, using fallback estimator");
        return WaitTimeEstimator::fallback_only();
    };

    match load_model(&path) {
        Ok(model) => {
            WaitTimeEstimator::with_primary(Arc::new(model), queue_config.prediction_timeout())
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Wait-time model unavailable, using fallback");
            WaitTimeEstimator::fallback_only()
        }
    }
}

fn load_model(path: &Path) -> anyhow::Result<LinearWaitModel> {
    Ok(LinearWaitModel::load(path)?)
}
