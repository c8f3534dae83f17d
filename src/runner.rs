//! Run orchestrator: apply config, start traffic, poll until done, stop.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::OtgApi;
use crate::config::RunConfig;
use crate::model::{ApiResponse, Config, MetricsRequest, MetricsSnapshot, Transmit, TransmitState};
use crate::policy::{CompletionPolicy, Verdict};
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ApplyingConfig,
    StartingTransmission,
    Polling,
    StoppingTransmission,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::ApplyingConfig => write!(f, "applying-config"),
            RunState::StartingTransmission => write!(f, "starting-transmission"),
            RunState::Polling => write!(f, "polling"),
            RunState::StoppingTransmission => write!(f, "stopping-transmission"),
            RunState::Done => write!(f, "done"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub target: Target,
    /// Metrics snapshots fetched, including the first one.
    pub snapshots: usize,
    /// Time from transmission start to the last evaluated snapshot.
    pub elapsed: Duration,
    pub verdict: Verdict,
}

/// Drives one traffic run against an OTG server.
///
/// Metrics snapshots are written to `out` as received, one JSON document per
/// line.
pub struct Runner<A, W> {
    api: A,
    config: RunConfig,
    out: W,
    state: RunState,
}

impl<A: OtgApi, W: Write> Runner<A, W> {
    pub fn new(api: A, config: RunConfig, out: W) -> Self {
        Self {
            api,
            config,
            out,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run `model` to completion. Any failed call aborts the run as is:
    /// traffic that was started is not stopped.
    pub async fn run(&mut self, model: &Config) -> Result<RunReport> {
        let result = self.drive(model).await;
        if result.is_err() {
            self.transition(RunState::Failed);
        }
        result
    }

    async fn drive(&mut self, model: &Config) -> Result<RunReport> {
        self.transition(RunState::ApplyingConfig);
        info!("Applying OTG config...");
        let res = self
            .api
            .set_config(model)
            .await
            .context("failed to apply OTG config")?;
        self.check(ApiResponse::Warning(&res))?;
        info!("ready.");

        self.transition(RunState::StartingTransmission);
        info!("Starting traffic...");
        let res = self
            .api
            .set_transmit_state(&TransmitState::new(Transmit::Start))
            .await
            .context("failed to start traffic")?;
        self.check(ApiResponse::Warning(&res))?;
        info!("started...");

        let target = Target::from_config(model);
        info!(
            "Total packets to transmit: {}, ETA is: {:?}",
            target.tx_packets, target.eta
        );
        let policy = CompletionPolicy::new(self.config.metrics, &target, self.config.xeta);
        if let Some(deadline) = policy.deadline() {
            info!(?deadline, xeta = self.config.xeta, "traffic will be forced to stop after deadline");
        }
        let request = MetricsRequest::new(self.config.metrics);

        self.transition(RunState::Polling);
        let start = Instant::now();
        let mut snapshot = self.fetch_metrics(&request).await?;
        let mut snapshots = 1;
        let verdict = loop {
            let verdict = policy.evaluate(&snapshot.metrics, start.elapsed());
            if !verdict.is_running() {
                break verdict;
            }
            sleep(self.config.interval).await;
            snapshot = self.fetch_metrics(&request).await?;
            snapshots += 1;
        };
        let elapsed = start.elapsed();
        self.report_verdict(&verdict);

        self.transition(RunState::StoppingTransmission);
        info!("Stopping traffic...");
        let res = self
            .api
            .set_transmit_state(&TransmitState::new(Transmit::Stop))
            .await
            .context("failed to stop traffic")?;
        self.check(ApiResponse::Warning(&res))?;
        info!("stopped.");

        self.transition(RunState::Done);
        Ok(RunReport {
            target,
            snapshots,
            elapsed,
            verdict,
        })
    }

    async fn fetch_metrics(&mut self, request: &MetricsRequest) -> Result<MetricsSnapshot> {
        let snapshot = self
            .api
            .get_metrics(request)
            .await
            .with_context(|| format!("failed to fetch {} metrics", request.choice))?;
        self.check(ApiResponse::Metrics(&snapshot))?;
        Ok(snapshot)
    }

    fn check(&mut self, response: ApiResponse<'_>) -> Result<()> {
        match response {
            ApiResponse::Metrics(snapshot) => {
                serde_json::to_writer(&mut self.out, &snapshot.raw)
                    .context("failed to encode metrics response")?;
                writeln!(self.out).context("failed to write metrics response")?;
                self.out.flush().context("failed to write metrics response")?;
            }
            ApiResponse::Warning(res) => {
                for warning in &res.warnings {
                    info!("WARNING: {}", warning);
                }
            }
        }
        Ok(())
    }

    fn report_verdict(&self, verdict: &Verdict) {
        let xeta = self.config.xeta;
        match verdict {
            Verdict::Running | Verdict::Reached => debug!(?verdict, "traffic completed"),
            Verdict::ForcedStop {
                elapsed,
                flow: Some(name),
            } => warn!(
                "Traffic {} has been running for {:.1}s: {:.1} times longer than ETA. Forcing to stop",
                name,
                elapsed.as_secs_f64(),
                xeta
            ),
            Verdict::ForcedStop {
                elapsed,
                flow: None,
            } => warn!(
                "Traffic has been running for {:.1}s: {:.1} times longer than ETA. Forcing to stop",
                elapsed.as_secs_f64(),
                xeta
            ),
            Verdict::Unrecognized => warn!(
                mode = %self.config.metrics,
                "metrics response does not match the requested mode, stopping"
            ),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }
}
