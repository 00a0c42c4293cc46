//! Child-process supervision.
//!
//! One [`ManagedProcess`] per cluster member. The handle is stable for the
//! whole run; restarts only swap the child behind it. Output of every
//! incarnation is appended to `<log_dir>/<name>.log`.

use crate::cluster::ClusterMember;
use crate::error::SupervisorError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Upper bound on waiting for a killed child to be reaped.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    Running,
    Exited(Option<ExitStatus>),
}

impl ChildState {
    fn is_exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }
}

struct RunningChild {
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<ChildState>,
    monitor: JoinHandle<()>,
}

/// Clears the liveness flag when the monitor ends, even by panic.
struct LivenessGuard(Arc<AtomicBool>);

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A supervised OS process with a stable identity.
pub struct ManagedProcess {
    name: String,
    binary: PathBuf,
    args: Vec<String>,
    log_dir: PathBuf,
    slot: Mutex<Option<RunningChild>>,
    lifecycle: tokio::sync::Mutex<()>,
    restarts: AtomicU32,
    last_restart: Mutex<Option<SystemTime>>,
}

impl ManagedProcess {
    /// Describe a process without starting it.
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<PathBuf>,
        args: Vec<String>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            args,
            log_dir: log_dir.into(),
            slot: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            restarts: AtomicU32::new(0),
            last_restart: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<RunningChild>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments passed to every incarnation.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Path of the append-only log file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.log", self.name))
    }

    /// OS pid of the current child, if one was started.
    pub fn pid(&self) -> Option<u32> {
        self.slot().as_ref().and_then(|running| running.pid)
    }

    /// True while the current child has not exited.
    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|running| running.alive.load(Ordering::SeqCst))
    }

    /// Completed restarts.
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Time of the last completed restart.
    pub fn last_restart(&self) -> Option<SystemTime> {
        *self
            .last_restart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the child unless one is already running.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_running() {
            return Ok(());
        }
        let child = self.spawn_child().await?;
        *self.slot() = Some(child);
        Ok(())
    }

    /// Kill the current child and wait for it to be reaped.
    ///
    /// Stopping a child that already exited succeeds; stopping a handle
    /// with no child returns [`SupervisorError::NotRunning`].
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    /// Stop (tolerating `NotRunning`), then start with the same identity.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let _lifecycle = self.lifecycle.lock().await;
        match self.stop_locked().await {
            Ok(()) | Err(SupervisorError::NotRunning { .. }) => {}
            Err(e) => return Err(e),
        }

        let child = self.spawn_child().await?;
        let pid = child.pid;
        *self.slot() = Some(child);

        let restarts = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .last_restart
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(SystemTime::now());
        tracing::info!(process = %self.name, pid = ?pid, restarts, "process restarted");
        Ok(())
    }

    /// Wait for the current child to exit on its own.
    pub async fn wait(&self) -> Result<ExitStatus, SupervisorError> {
        let mut exit_rx = match self.slot().as_ref() {
            Some(running) => running.exit_rx.clone(),
            None => {
                return Err(SupervisorError::NotRunning {
                    name: self.name.clone(),
                })
            }
        };

        let state = exit_rx.wait_for(ChildState::is_exited).await.map(|s| *s);
        match state {
            Ok(ChildState::Exited(Some(status))) => Ok(status),
            _ => Err(SupervisorError::Io(io::Error::other(format!(
                "exit status of {} unavailable",
                self.name
            )))),
        }
    }

    async fn stop_locked(&self) -> Result<(), SupervisorError> {
        let Some(mut running) = self.slot().take() else {
            return Err(SupervisorError::NotRunning {
                name: self.name.clone(),
            });
        };

        if let Some(kill_tx) = running.kill_tx.take() {
            // Receiver is gone when the child already exited
            let _ = kill_tx.send(());
        }

        let exited = running.exit_rx.wait_for(ChildState::is_exited);
        let reaped = tokio::time::timeout(STOP_TIMEOUT, exited).await.is_ok();
        if !reaped {
            tracing::warn!(process = %self.name, "child did not exit in time, abandoning monitor");
            running.monitor.abort();
        }
        tracing::debug!(process = %self.name, pid = ?running.pid, "process stopped");
        Ok(())
    }

    async fn spawn_child(&self) -> Result<RunningChild, SupervisorError> {
        tokio::fs::create_dir_all(&self.log_dir).await?;
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .await?
            .into_std()
            .await;
        let log_err = log.try_clone()?;

        let child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        let pid = child.id();
        tracing::info!(
            process = %self.name,
            pid = ?pid,
            binary = %self.binary.display(),
            "process started"
        );

        let alive = Arc::new(AtomicBool::new(true));
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(ChildState::Running);
        let monitor = tokio::spawn(monitor_child(
            self.name.clone(),
            child,
            LivenessGuard(Arc::clone(&alive)),
            kill_rx,
            exit_tx,
        ));

        Ok(RunningChild {
            pid,
            alive,
            kill_tx: Some(kill_tx),
            exit_rx,
            monitor,
        })
    }
}

/// Liveness monitor: one per child, ends when the child is reaped.
async fn monitor_child(
    name: String,
    mut child: Child,
    liveness: LivenessGuard,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<ChildState>,
) {
    // A dropped kill switch also means "kill": the handle is gone
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(process = %name, error = %e, "kill failed");
            }
            child.wait().await
        }
    };

    match &status {
        Ok(status) => tracing::info!(process = %name, %status, "process exited"),
        Err(e) => tracing::warn!(process = %name, error = %e, "failed to reap process"),
    }

    drop(liveness);
    exit_tx.send_replace(ChildState::Exited(status.ok()));
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("name", &self.name)
            .field("binary", &self.binary)
            .field("pid", &self.pid())
            .field("running", &self.is_running())
            .field("restarts", &self.restart_count())
            .finish()
    }
}

#[async_trait]
impl ClusterMember for ManagedProcess {
    fn name(&self) -> &str {
        &self.name
    }

    async fn restart(&self) -> Result<(), SupervisorError> {
        ManagedProcess::restart(self).await
    }
}

/// Owns the log directory and every process it started.
#[derive(Debug)]
pub struct ProcessSupervisor {
    log_dir: PathBuf,
    handles: Mutex<Vec<Arc<ManagedProcess>>>,
}

impl ProcessSupervisor {
    /// Create a supervisor writing logs under `log_dir`.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Log directory.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Start a named process and keep its handle.
    pub async fn start(
        &self,
        name: &str,
        binary: impl AsRef<Path>,
        args: Vec<String>,
    ) -> Result<Arc<ManagedProcess>, SupervisorError> {
        let process = Arc::new(ManagedProcess::new(
            name,
            binary.as_ref(),
            args,
            self.log_dir.clone(),
        ));
        process.start().await?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&process));
        Ok(process)
    }

    /// Every handle started so far.
    pub fn handles(&self) -> Vec<Arc<ManagedProcess>> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop every process that still has a child.
    pub async fn stop_all(&self) {
        for process in self.handles() {
            match process.stop().await {
                Ok(()) | Err(SupervisorError::NotRunning { .. }) => {}
                Err(e) => {
                    tracing::warn!(process = %process.name(), error = %e, "failed to stop process")
                }
            }
        }
    }
}
