//! Worker lifecycle state machine.
//!
//! A pure, side-effect-free state machine for one benchmark worker. It takes
//! events as input and produces a new phase plus a list of actions for the
//! worker task to execute:
//!
//! ```text
//! Provisioning ──► WaitingForBarrier ──► Iterating ──► Done
//!      │                  │                  │
//!      └──────────────────┴──────────────────┴──────► Failed
//! ```
//!
//! The actual I/O (SQL, waiting on the run gate) is performed by the worker
//! in bench-harness, not by this module.

use serde::{Deserialize, Serialize};

/// Worker phase - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Creating the workload table and seeding counters.
    Provisioning {
        /// Iterations to run once the barrier is raised.
        iterations: u32,
    },
    /// Provisioned, waiting for the coordinator to start the run.
    WaitingForBarrier {
        /// Iterations to run once the barrier is raised.
        iterations: u32,
    },
    /// Running read-modify-write and append passes.
    Iterating {
        /// Iterations finished so far.
        completed: u32,
        /// Iterations to run in total.
        total: u32,
    },
    /// Finished (all iterations, or stopped cooperatively).
    Done,
    /// Terminated by a fatal error.
    Failed {
        /// Short description of the error.
        reason: String,
    },
}

impl WorkerPhase {
    /// Create a worker phase machine that will run `iterations` iterations.
    pub fn new(iterations: u32) -> Self {
        Self::Provisioning { iterations }
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. Every non-terminal
    /// transition yields exactly one action that produces the next event.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<PhaseAction>) {
        match (self, event) {
            // From Provisioning
            (Self::Provisioning { iterations }, PhaseEvent::Provisioned) => (
                Self::WaitingForBarrier { iterations },
                vec![PhaseAction::AwaitBarrier],
            ),
            // Provisioning failures are reported without an error pulse
            (Self::Provisioning { .. }, PhaseEvent::Failed { reason }) => (
                Self::Failed {
                    reason: reason.clone(),
                },
                vec![PhaseAction::Finish(WorkerOutcome::Failed { reason })],
            ),

            // From WaitingForBarrier
            (Self::WaitingForBarrier { iterations: 0 }, PhaseEvent::BarrierRaised) => (
                Self::Done,
                vec![PhaseAction::Finish(WorkerOutcome::Completed { iterations: 0 })],
            ),
            (Self::WaitingForBarrier { iterations }, PhaseEvent::BarrierRaised) => (
                Self::Iterating {
                    completed: 0,
                    total: iterations,
                },
                vec![PhaseAction::RunIteration { index: 0 }],
            ),
            (Self::WaitingForBarrier { .. }, PhaseEvent::StopRequested) => (
                Self::Done,
                vec![PhaseAction::Finish(WorkerOutcome::Aborted { iterations: 0 })],
            ),

            // From Iterating
            (Self::Iterating { completed, total }, PhaseEvent::IterationCompleted) => {
                let completed = completed.saturating_add(1);
                if completed >= total {
                    (
                        Self::Done,
                        vec![PhaseAction::Finish(WorkerOutcome::Completed {
                            iterations: completed,
                        })],
                    )
                } else {
                    (
                        Self::Iterating { completed, total },
                        vec![PhaseAction::RunIteration { index: completed }],
                    )
                }
            }
            (Self::Iterating { completed, .. }, PhaseEvent::StopRequested) => (
                Self::Done,
                vec![PhaseAction::Finish(WorkerOutcome::Aborted {
                    iterations: completed,
                })],
            ),
            (Self::Iterating { .. }, PhaseEvent::Failed { reason }) => (
                Self::Failed {
                    reason: reason.clone(),
                },
                vec![
                    PhaseAction::RecordErrorPulse,
                    PhaseAction::Finish(WorkerOutcome::Failed { reason }),
                ],
            ),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Check if the worker reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

/// Events that drive a worker's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Table created and counters seeded.
    Provisioned,
    /// The coordinator raised the start barrier.
    BarrierRaised,
    /// One read-modify-write + append iteration finished.
    IterationCompleted,
    /// Cooperative stop observed.
    StopRequested,
    /// Fatal error.
    Failed {
        /// Short description of the error.
        reason: String,
    },
}

/// Actions to be executed by the worker task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseAction {
    /// Wait for the run gate to open (or close).
    AwaitBarrier,
    /// Run iteration number `index` (zero-based).
    RunIteration {
        /// Zero-based iteration index.
        index: u32,
    },
    /// Record a short ERROR pulse marking the failure moment.
    RecordErrorPulse,
    /// Report the outcome on the completion channel and exit.
    Finish(WorkerOutcome),
}

/// Final outcome of a worker, reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerOutcome {
    /// Ran every configured iteration.
    Completed {
        /// Iterations run.
        iterations: u32,
    },
    /// Stopped cooperatively before finishing.
    Aborted {
        /// Iterations finished before the stop.
        iterations: u32,
    },
    /// Terminated by a fatal error.
    Failed {
        /// Short description of the error.
        reason: String,
    },
}

impl WorkerOutcome {
    /// True for [`WorkerOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// True for [`WorkerOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
