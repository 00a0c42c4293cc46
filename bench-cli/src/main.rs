//! # chaosbench
//!
//! Fault-injecting load harness for Postgres-wire distributed SQL clusters.
//!
//! Starts a local cluster, runs concurrent read-modify-write workers
//! against it, optionally restarts random nodes while they run, and writes
//! one chart per telemetry series when the run ends.
//!
//! ## Example
//!
//! ```bash
//! # Three nodes, ten workers, no chaos
//! chaosbench --binary /opt/cockroach/cockroach
//!
//! # Random restarts, settings from a file
//! chaosbench --config chaosbench.toml --chaos
//!
//! # In-process dry run (no server binary needed)
//! chaosbench --memory --threads 4 --iterations 3 --chaos
//! ```

use anyhow::{bail, Context, Result};
use bench_harness::sampler::{spawn_status_scraper, spawn_system_sampler};
use bench_harness::{
    ChaosInjector, ClusterView, MetricsAggregator, RunSummary, RunTelemetry, Store,
    WorkerCoordinator,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cluster;
mod config;

use cluster::{memory_cluster, Cluster};
use config::{BenchConfig, Overrides};

/// Default configuration file, read when present.
const DEFAULT_CONFIG: &str = "chaosbench.toml";

/// Fault-injecting load harness for distributed SQL clusters.
#[derive(Parser, Debug)]
#[command(name = "chaosbench")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: chaosbench.toml if present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, short)]
    threads: Option<u32>,

    /// Iterations per worker
    #[arg(long, short)]
    iterations: Option<u32>,

    /// Number of cluster nodes
    #[arg(long)]
    nodes: Option<u32>,

    /// Restart random nodes during the run
    #[arg(long)]
    chaos: bool,

    /// Server binary
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Directory for node stores and process logs
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Directory for charts and the JSON dump
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Use an in-process memory store instead of real server processes
    #[arg(long)]
    memory: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            threads: self.threads,
            iterations: self.iterations,
            nodes: self.nodes,
            chaos: self.chaos,
            binary: self.binary.clone(),
            work_dir: self.work_dir.clone(),
            out_dir: self.out_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    tracing::info!(
        run_id = %run_id,
        threads = config.workload.threads,
        nodes = config.cluster.nodes,
        chaos = config.chaos.enabled,
        "chaosbench starting"
    );

    let (summary, telemetry) = if cli.memory {
        let (store, view) = memory_cluster(&config)?;
        run(&config, Arc::new(store), view, false).await
    } else {
        let cluster = Cluster::bring_up(&config)
            .await
            .context("Failed to bring up cluster")?;
        let view = match cluster.view(&config) {
            Ok(view) => view,
            Err(e) => {
                cluster.teardown().await;
                return Err(e);
            }
        };
        let outcome = run(&config, Arc::new(config.store()), view, true).await;
        cluster.teardown().await;
        outcome
    };

    let artifacts = write_artifacts(&config, telemetry, &run_id).await;
    conclude(&summary, artifacts)
}

/// Print the summary, then turn the run into an exit status.
///
/// Failed workers take precedence over artifact errors; both are reported.
fn conclude(summary: &RunSummary, artifacts: Result<Vec<PathBuf>>) -> Result<()> {
    print_summary(summary);
    let artifacts = match artifacts {
        Ok(written) => {
            for path in &written {
                tracing::info!(path = %path.display(), "artifact written");
            }
            Ok(())
        }
        Err(e) if summary.failed() > 0 => {
            tracing::error!(error = %format!("{e:#}"), "failed to write run artifacts");
            Ok(())
        }
        Err(e) => Err(e),
    };
    if summary.failed() > 0 {
        bail!("{} of {} workers failed", summary.failed(), summary.threads);
    }
    artifacts
}

fn load_config(cli: &Cli) -> Result<BenchConfig> {
    let mut config = match &cli.config {
        Some(path) => BenchConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            BenchConfig::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => BenchConfig::default(),
    };
    config.apply(cli.overrides());
    config.validate()?;
    Ok(config)
}

/// Run the workload and collect its telemetry.
async fn run(
    config: &BenchConfig,
    store: Arc<dyn Store>,
    view: ClusterView,
    scrape_status: bool,
) -> (RunSummary, RunTelemetry) {
    let (aggregator, recorder) = MetricsAggregator::spawn(config.metrics.capacity);

    let period = Duration::from_millis(config.samplers.interval_ms);
    let mut samplers = Vec::new();
    if config.samplers.system {
        samplers.push(spawn_system_sampler(recorder.clone(), period));
    }
    if config.samplers.status && scrape_status {
        samplers.push(spawn_status_scraper(recorder.clone(), config.status_url(), period));
    }

    let view = Arc::new(view);
    let chaos = ChaosInjector::new(Arc::clone(&view), recorder.clone(), config.chaos());
    let summary = WorkerCoordinator::new(config.coordinator(), store, view, recorder)
        .with_chaos(chaos)
        .run(shutdown_signal())
        .await;

    for sampler in samplers {
        sampler.abort();
    }
    (summary, aggregator.shutdown().await)
}

/// Write the JSON dump and one chart per series into the output directory.
async fn write_artifacts(
    config: &BenchConfig,
    telemetry: RunTelemetry,
    run_id: &str,
) -> Result<Vec<PathBuf>> {
    let out_dir = config.metrics.out_dir.clone();
    let write_json = config.metrics.json;
    let suffix = format!("{run_id}.png");
    let json_path = out_dir.join(format!("run-{run_id}.json"));

    // Rendering is CPU-bound
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
        let mut written = Vec::new();
        if write_json {
            telemetry
                .write_json(&json_path)
                .context("Failed to write telemetry dump")?;
            written.push(json_path);
        }
        written.extend(
            telemetry
                .render(&out_dir, &suffix)
                .context("Failed to render charts")?,
        );
        Ok(written)
    })
    .await
    .context("Render task panicked")?
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run summary");
    println!("  workers:     {}", summary.threads);
    println!("  completed:   {}", summary.completed());
    println!("  aborted:     {}", summary.aborted());
    println!("  failed:      {}", summary.failed());
    println!("  outstanding: {}", summary.outstanding());
    println!("  reconnects:  {}", summary.reconnects());
    if summary.interrupted {
        println!("  (interrupted)");
    }
    for report in summary.reports.iter().filter(|r| r.outcome.is_failed()) {
        println!("  worker {}: {:?}", report.id, report.outcome);
    }
}
