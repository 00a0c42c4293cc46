//! Chaos injection: random restarts of live cluster members.
//!
//! A schedule task emits triggers at random intervals; the coordinator's
//! control loop turns each trigger into a [`ChaosInjector::strike`]. At most
//! one restart is in flight at any time.

use crate::cluster::ClusterView;
use crate::metrics::Recorder;
use bench_types::Event;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Chaos settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaosConfig {
    /// Whether the schedule runs at all.
    pub enabled: bool,
    /// Upper bound (exclusive) of the random wait between triggers.
    pub max_interval: Duration,
    /// Time the restart lock stays held after a restart completes.
    pub grace: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_interval: Duration::from_secs(60),
            grace: Duration::from_secs(2),
        }
    }
}

/// Releases the restart lock when dropped.
struct LockRelease(Arc<AtomicBool>);

impl Drop for LockRelease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Restarts random cluster members, one at a time.
#[derive(Debug, Clone)]
pub struct ChaosInjector {
    cluster: Arc<ClusterView>,
    recorder: Recorder,
    config: ChaosConfig,
    restarting: Arc<AtomicBool>,
}

impl ChaosInjector {
    /// Create an injector over `cluster`.
    pub fn new(cluster: Arc<ClusterView>, recorder: Recorder, config: ChaosConfig) -> Self {
        Self {
            cluster,
            recorder,
            config,
            restarting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a restart (or its grace period) is in flight.
    pub fn is_restarting(&self) -> bool {
        self.restarting.load(Ordering::Acquire)
    }

    /// Start the trigger schedule. `None` when chaos is disabled.
    ///
    /// The task ends when the receiving side of `triggers` is dropped.
    pub fn spawn_schedule(&self, triggers: mpsc::Sender<()>) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("chaos injection disabled");
            return None;
        }

        let max_interval = self.config.max_interval;
        tracing::info!(max_interval = ?max_interval, "chaos schedule started");

        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(random_delay(max_interval)).await;
                if triggers.send(()).await.is_err() {
                    break;
                }
            }
        }))
    }

    /// Restart one random member unless a restart is already in flight.
    ///
    /// Returns the chosen member's name. The restart itself runs in the
    /// background; failures are logged.
    pub async fn strike(&self) -> Option<String> {
        if self
            .restarting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let release = LockRelease(Arc::clone(&self.restarting));

        let Some(member) = self.cluster.random_member().cloned() else {
            tracing::warn!("no cluster members to restart");
            return None;
        };
        let name = member.name().to_string();

        tracing::info!(member = %name, "restarting cluster member");
        self.recorder
            .event(Event::new(format!("Restarted {name}")))
            .await;

        let grace = self.config.grace;
        tokio::spawn(async move {
            let _release = release;
            if let Err(e) = member.restart().await {
                tracing::warn!(member = %member.name(), error = %e, "chaos restart failed");
            }
            tokio::time::sleep(grace).await;
        });

        Some(name)
    }
}

/// Uniform delay in `[0, max)`.
fn random_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}
