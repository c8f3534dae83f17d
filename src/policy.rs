//! Completion policy: decides whether traffic is still running.
//!
//! A single policy covers both the plain "target reached" check and the
//! forced-stop variant. The latter is just the same check with a deadline
//! of `ETA x xeta` attached.

use std::time::Duration;

use crate::model::{MetricsMode, MetricsResponse};
use crate::target::Target;

/// Outcome of evaluating one metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling.
    Running,
    /// Port counters reached the target, or every flow reports stopped.
    Reached,
    /// The deadline passed before traffic completed.
    ForcedStop {
        elapsed: Duration,
        /// Flow being scanned when the deadline was detected (flow mode only).
        flow: Option<String>,
    },
    /// The snapshot is not of the kind the run asked for.
    Unrecognized,
}

impl Verdict {
    pub fn is_running(&self) -> bool {
        matches!(self, Verdict::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPolicy {
    mode: MetricsMode,
    target_tx: u64,
    deadline: Option<Duration>,
}

impl CompletionPolicy {
    /// `xeta <= 0` disables the deadline. A zero ETA disables it as well.
    pub fn new(mode: MetricsMode, target: &Target, xeta: f64) -> Self {
        Self {
            mode,
            target_tx: target.tx_packets,
            deadline: deadline(target.eta, xeta),
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Judge a snapshot taken `elapsed` after transmission started.
    ///
    /// Pure: the same snapshot and elapsed time always give the same verdict.
    pub fn evaluate(&self, snapshot: &MetricsResponse, elapsed: Duration) -> Verdict {
        if !snapshot.matches(self.mode) {
            return Verdict::Unrecognized;
        }
        match self.mode {
            MetricsMode::Port => self.evaluate_ports(snapshot, elapsed),
            MetricsMode::Flow => self.evaluate_flows(snapshot, elapsed),
        }
    }

    fn expired(&self, elapsed: Duration) -> bool {
        self.deadline.is_some_and(|deadline| elapsed > deadline)
    }

    fn evaluate_ports(&self, snapshot: &MetricsResponse, elapsed: Duration) -> Verdict {
        if self.expired(elapsed) {
            return Verdict::ForcedStop {
                elapsed,
                flow: None,
            };
        }
        if snapshot.total_frames_tx() < self.target_tx {
            Verdict::Running
        } else {
            Verdict::Reached
        }
    }

    fn evaluate_flows(&self, snapshot: &MetricsResponse, elapsed: Duration) -> Verdict {
        let mut running = false;
        for fm in &snapshot.flow_metrics {
            if !fm.is_stopped() {
                running = true;
            }
            // Short-circuits on the first flow scanned past the deadline.
            if self.expired(elapsed) {
                return Verdict::ForcedStop {
                    elapsed,
                    flow: Some(fm.name.clone()),
                };
            }
        }
        if running {
            Verdict::Running
        } else {
            Verdict::Reached
        }
    }
}

fn deadline(eta: Duration, xeta: f64) -> Option<Duration> {
    if xeta.is_nan() || xeta <= 0.0 || eta.is_zero() {
        return None;
    }
    Duration::try_from_secs_f64(eta.as_secs_f64() * xeta).ok()
}
