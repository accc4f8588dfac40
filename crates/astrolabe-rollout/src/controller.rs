//! Verification orchestrator — drives the per-testcase state machine.
//!
//! Testcases run strictly one after another. Within a testcase the
//! orchestrator selects a baseline, pulls the pipeline trigger, waits for a
//! new revision and then retries each checkpoint until it passes. Only the
//! deadline, a shutdown request, or a failure before the pipeline started
//! ends a testcase early.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use astrolabe_cluster::ClusterApi;
use astrolabe_core::{
    select, Checkpoint, Plan, RevisionSnapshot, SelectionCriterion, TargetConfig, Testcase,
};
use astrolabe_trigger::{PipelineStatus, PipelineTrigger, TriggerError};

use crate::checker::check;
use crate::error::{CheckError, VerifyError};
use crate::monitor::PipelineMonitor;
use crate::poller::Poller;
use crate::watcher::RolloutWatcher;

/// Where a testcase currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPhase {
    /// Listing revisions to pick the current and baseline revisions.
    SelectingBaseline,
    /// Starting the deploy pipeline.
    Triggering,
    /// Waiting for a revision newer than the baseline.
    WaitingForRevision,
    /// Retrying checkpoint `current` of `total` (1-based).
    CheckingCheckpoint { current: usize, total: usize },
    /// Every checkpoint of every testcase passed.
    Done,
}

impl fmt::Display for VerificationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectingBaseline => f.write_str("selecting the baseline revision"),
            Self::Triggering => f.write_str("triggering the deploy pipeline"),
            Self::WaitingForRevision => f.write_str("waiting for a new revision"),
            Self::CheckingCheckpoint { current, total } => {
                write!(f, "checking checkpoint {current}/{total}")
            }
            Self::Done => f.write_str("done"),
        }
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub testcases: Vec<TestcaseReport>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct TestcaseReport {
    pub name: String,
    /// Revision picked by the configured criterion before triggering.
    pub current: String,
    /// Newest revision before triggering.
    pub baseline: String,
    /// Revision that replaced the baseline.
    pub incoming: String,
    pub checkpoints: Vec<CheckpointReport>,
    /// Last status the pipeline backend reported, if it ever answered.
    pub pipeline_status: Option<PipelineStatus>,
    /// Confirmation callbacks issued while waiting.
    pub confirmations: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointReport {
    pub name: String,
    /// Checks run until the checkpoint passed, the passing one included.
    pub attempts: u32,
}

pub struct Orchestrator<'a> {
    cluster: &'a dyn ClusterApi,
    target: &'a TargetConfig,
    interval: Duration,
    timeout: Option<Duration>,
    shutdown: watch::Receiver<bool>,
    phase: VerificationPhase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        cluster: &'a dyn ClusterApi,
        target: &'a TargetConfig,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cluster,
            target,
            interval,
            timeout: None,
            shutdown,
            phase: VerificationPhase::SelectingBaseline,
        }
    }

    /// Bound each testcase, measured from its baseline selection.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Orchestrator for the target, interval and timeout of `plan`.
    pub fn from_plan(
        plan: &'a Plan,
        cluster: &'a dyn ClusterApi,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self::new(cluster, &plan.target, plan.poll_interval(), shutdown)
            .with_timeout(plan.timeout())
    }

    pub fn phase(&self) -> VerificationPhase {
        self.phase
    }

    /// Run every testcase in order. `make_trigger` is called once per
    /// testcase so each gets a fresh pipeline session.
    pub async fn run<F>(
        &mut self,
        testcases: &[Testcase],
        mut make_trigger: F,
    ) -> Result<VerificationReport, VerifyError>
    where
        F: FnMut() -> Result<Box<dyn PipelineTrigger>, TriggerError>,
    {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(testcases.len());

        for testcase in testcases {
            let mut trigger = make_trigger().map_err(VerifyError::TriggerSetup)?;
            reports.push(self.run_testcase(testcase, trigger.as_mut()).await?);
        }

        self.phase = VerificationPhase::Done;
        info!(testcases = reports.len(), "verification complete");
        Ok(VerificationReport {
            testcases: reports,
            elapsed: started.elapsed(),
        })
    }

    /// Run one testcase from baseline selection to its last checkpoint.
    pub async fn run_testcase(
        &mut self,
        testcase: &Testcase,
        trigger: &mut dyn PipelineTrigger,
    ) -> Result<TestcaseReport, VerifyError> {
        let started = Instant::now();
        let mut poller =
            Poller::new(self.interval, self.shutdown.clone()).with_timeout(self.timeout);
        let watcher = RolloutWatcher::new(self.cluster, self.target);
        let name = testcase.name.as_str();

        let phase = self.enter(name, VerificationPhase::SelectingBaseline);
        let revisions = poller.guard(phase, watcher.list()).await??;
        let current = select(&revisions, self.target.current_version_criteria)?.clone();
        let baseline = select(&revisions, SelectionCriterion::Newest)?.clone();
        info!(
            testcase = %name,
            current = %current.name,
            baseline = %baseline.name,
            "baseline selected"
        );

        let phase = self.enter(name, VerificationPhase::Triggering);
        let confirm = poller.guard(phase, trigger.pull()).await??;
        info!(testcase = %name, trigger = trigger.kind(), "deploy pipeline triggered");
        let mut monitor = PipelineMonitor::new(confirm);

        self.enter(name, VerificationPhase::WaitingForRevision);
        let incoming = watcher
            .wait_for_new_revision(&baseline.name, &mut poller, &mut monitor)
            .await?;

        let total = testcase.checkpoints.len();
        let mut checkpoints = Vec::with_capacity(total);
        for (i, checkpoint) in testcase.checkpoints.iter().enumerate() {
            let phase = self.enter(
                name,
                VerificationPhase::CheckingCheckpoint {
                    current: i + 1,
                    total,
                },
            );
            let attempts = self
                .await_checkpoint(
                    checkpoint,
                    &watcher,
                    (&current, &incoming),
                    &mut poller,
                    &mut monitor,
                    phase,
                )
                .await?;
            checkpoints.push(CheckpointReport {
                name: checkpoint.name.clone(),
                attempts,
            });
        }

        info!(testcase = %name, incoming = %incoming.name, "testcase passed");
        Ok(TestcaseReport {
            name: testcase.name.clone(),
            current: current.name,
            baseline: baseline.name,
            incoming: incoming.name,
            checkpoints,
            pipeline_status: monitor.last_status().cloned(),
            confirmations: monitor.ticks(),
            elapsed: started.elapsed(),
        })
    }

    fn enter(&mut self, testcase: &str, phase: VerificationPhase) -> VerificationPhase {
        info!(testcase, %phase, "phase transition");
        self.phase = phase;
        phase
    }

    /// Retry `checkpoint` until it passes, returning the attempt count.
    async fn await_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        watcher: &RolloutWatcher<'_>,
        (current, incoming): (&RevisionSnapshot, &RevisionSnapshot),
        poller: &mut Poller,
        monitor: &mut PipelineMonitor,
        phase: VerificationPhase,
    ) -> Result<u32, VerifyError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = poller
                .guard(phase, self.attempt_checkpoint(checkpoint, watcher, current, incoming))
                .await?;
            match outcome {
                Ok(true) => {
                    info!(checkpoint = %checkpoint.name, attempt, "checkpoint passed");
                    return Ok(attempt);
                }
                Ok(false) => {
                    debug!(checkpoint = %checkpoint.name, attempt, "checkpoint not passed yet")
                }
                Err(e) => warn!(
                    checkpoint = %checkpoint.name,
                    attempt,
                    error = %e,
                    "checkpoint check failed"
                ),
            }

            poller.pause(phase).await?;
            monitor.tick(poller, phase).await?;
        }
    }

    async fn attempt_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        watcher: &RolloutWatcher<'_>,
        current: &RevisionSnapshot,
        incoming: &RevisionSnapshot,
    ) -> Result<bool, CheckError> {
        let (current, incoming) = watcher.refresh_pair(current, incoming).await?;
        check(checkpoint, &current, &incoming, self.cluster).await
    }
}
