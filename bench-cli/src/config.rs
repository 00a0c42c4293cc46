//! Configuration loading for chaosbench.
//!
//! Configuration is loaded from a TOML file (default: `chaosbench.toml`,
//! optional). Every field has a default; command-line flags override
//! file values.

use bench_core::RetryPolicy;
use bench_harness::{ChaosConfig, CoordinatorConfig, PgStore, WorkerConfig};
use bench_types::Endpoint;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for chaosbench.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchConfig {
    /// Cluster bring-up.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Worker workload.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Chaos injection.
    #[serde(default)]
    pub chaos: ChaosSection,
    /// Reconnect policy.
    #[serde(default)]
    pub retry: RetrySection,
    /// Telemetry output.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Background samplers.
    #[serde(default)]
    pub samplers: SamplersConfig,
}

/// Cluster configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Server binary (default: `cockroach` from PATH).
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Number of nodes (default: 3).
    #[serde(default = "default_nodes")]
    pub nodes: u32,
    /// Host every node listens on (default: localhost).
    #[serde(default = "default_host")]
    pub host: String,
    /// SQL port of the first node; node N uses base + N - 1 (default: 26257).
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// HTTP port of the first node (default: 8080).
    #[serde(default = "default_http_base_port")]
    pub http_base_port: u16,
    /// Directory for node stores and process logs (default: chaosbench-data).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Database the workload runs in (default: test).
    #[serde(default = "default_database")]
    pub database: String,
    /// SQL login user (default: root).
    #[serde(default = "default_user")]
    pub user: String,
    /// Pause after the cluster is initialized, in seconds (default: 2).
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Keep node stores after the run (default: false).
    #[serde(default)]
    pub keep_data: bool,
}

/// Workload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Concurrent workers (default: 10).
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Iterations per worker (default: 10).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Counters per worker (default: 10).
    #[serde(default = "default_counters")]
    pub counters: usize,
    /// Rows appended per iteration (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between worker launches in ms (default: 500).
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
}

/// Chaos configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChaosSection {
    /// Enable random restarts (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Upper bound of the wait between restarts in seconds (default: 60).
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
    /// Lock hold time after a restart completes in seconds (default: 2).
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

/// Reconnect policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Reconnects per operation before the worker gives up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in ms (default: 100).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in ms (default: 2000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Telemetry output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Chart and dump directory (default: charts).
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Queue capacity for stats and events (default: 10000).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Write a JSON dump next to the charts (default: true).
    #[serde(default = "default_true")]
    pub json: bool,
}

/// Sampler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplersConfig {
    /// Sample host CPU (default: true).
    #[serde(default = "default_true")]
    pub system: bool,
    /// Scrape store statement counters (default: true).
    #[serde(default = "default_true")]
    pub status: bool,
    /// Sampling interval in ms (default: 1000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_binary() -> PathBuf {
    PathBuf::from("cockroach")
}

fn default_nodes() -> u32 {
    3
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_base_port() -> u16 {
    26257
}

fn default_http_base_port() -> u16 {
    8080
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("chaosbench-data")
}

fn default_database() -> String {
    "test".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_settle_secs() -> u64 {
    2
}

fn default_threads() -> u32 {
    10
}

fn default_iterations() -> u32 {
    10
}

fn default_counters() -> usize {
    10
}

fn default_batch_size() -> usize {
    10
}

fn default_stagger_ms() -> u64 {
    500
}

fn default_max_interval_secs() -> u64 {
    60
}

fn default_grace_secs() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_capacity() -> usize {
    bench_harness::DEFAULT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            nodes: default_nodes(),
            host: default_host(),
            base_port: default_base_port(),
            http_base_port: default_http_base_port(),
            work_dir: default_work_dir(),
            database: default_database(),
            user: default_user(),
            settle_secs: default_settle_secs(),
            keep_data: false,
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            iterations: default_iterations(),
            counters: default_counters(),
            batch_size: default_batch_size(),
            stagger_ms: default_stagger_ms(),
        }
    }
}

impl Default for ChaosSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_interval_secs: default_max_interval_secs(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            capacity: default_capacity(),
            json: true,
        }
    }
}

impl Default for SamplersConfig {
    fn default() -> Self {
        Self {
            system: true,
            status: true,
            interval_ms: default_interval_ms(),
        }
    }
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--threads`
    pub threads: Option<u32>,
    /// `--iterations`
    pub iterations: Option<u32>,
    /// `--nodes`
    pub nodes: Option<u32>,
    /// `--chaos`
    pub chaos: bool,
    /// `--binary`
    pub binary: Option<PathBuf>,
    /// `--work-dir`
    pub work_dir: Option<PathBuf>,
    /// `--out-dir`
    pub out_dir: Option<PathBuf>,
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(threads) = overrides.threads {
            self.workload.threads = threads;
        }
        if let Some(iterations) = overrides.iterations {
            self.workload.iterations = iterations;
        }
        if let Some(nodes) = overrides.nodes {
            self.cluster.nodes = nodes;
        }
        if overrides.chaos {
            self.chaos.enabled = true;
        }
        if let Some(binary) = overrides.binary {
            self.cluster.binary = binary;
        }
        if let Some(work_dir) = overrides.work_dir {
            self.cluster.work_dir = work_dir;
        }
        if let Some(out_dir) = overrides.out_dir {
            self.metrics.out_dir = out_dir;
        }
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workload.threads == 0 {
            return Err(ConfigError::Invalid("workload.threads must be at least 1".into()));
        }
        if self.workload.counters == 0 {
            return Err(ConfigError::Invalid("workload.counters must be at least 1".into()));
        }
        if self.cluster.nodes == 0 {
            return Err(ConfigError::Invalid("cluster.nodes must be at least 1".into()));
        }
        if self.cluster.binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cluster.binary must not be empty".into()));
        }
        let last_port = u32::from(self.cluster.base_port) + self.cluster.nodes - 1;
        let last_http = u32::from(self.cluster.http_base_port) + self.cluster.nodes - 1;
        if last_port > u32::from(u16::MAX) || last_http > u32::from(u16::MAX) {
            return Err(ConfigError::Invalid("cluster ports exceed 65535".into()));
        }
        Ok(())
    }

    /// SQL endpoint of every node, in node order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        (0..self.cluster.nodes)
            .map(|i| Endpoint::new(self.cluster.host.clone(), self.cluster.base_port + i as u16))
            .collect()
    }

    /// Status vars URL of the first node.
    pub fn status_url(&self) -> String {
        format!(
            "http://{}:{}/_status/vars",
            self.cluster.host, self.cluster.http_base_port
        )
    }

    /// Coordinator settings.
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            threads: self.workload.threads,
            stagger: Duration::from_millis(self.workload.stagger_ms),
            worker: WorkerConfig {
                counters: self.workload.counters,
                iterations: self.workload.iterations,
                batch_size: self.workload.batch_size,
                retry: RetryPolicy {
                    max_attempts: self.retry.max_attempts,
                    base_delay: Duration::from_millis(self.retry.base_delay_ms),
                    max_delay: Duration::from_millis(self.retry.max_delay_ms),
                },
            },
        }
    }

    /// Postgres-wire store for the configured database and user.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.cluster.database.clone()).with_username(self.cluster.user.clone())
    }

    /// Chaos settings.
    pub fn chaos(&self) -> ChaosConfig {
        ChaosConfig {
            enabled: self.chaos.enabled,
            max_interval: Duration::from_secs(self.chaos.max_interval_secs),
            grace: Duration::from_secs(self.chaos.grace_secs),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Values that cannot run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
