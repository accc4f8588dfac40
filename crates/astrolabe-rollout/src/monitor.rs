//! Advisory pipeline confirmation.
//!
//! The confirm callback from [`PipelineTrigger::pull`] is invoked once per
//! poll tick. Its answer is only logged: a failing or unreachable pipeline
//! backend never stops the verification, only the deadline or a shutdown
//! request can.
//!
//! [`PipelineTrigger::pull`]: astrolabe_trigger::PipelineTrigger::pull

use tracing::{debug, info, warn};

use astrolabe_trigger::{ConfirmFn, PipelineStatus};

use crate::controller::VerificationPhase;
use crate::error::VerifyError;
use crate::poller::Poller;

pub struct PipelineMonitor {
    confirm: ConfirmFn,
    last: Option<PipelineStatus>,
    ticks: u32,
}

impl PipelineMonitor {
    pub fn new(confirm: ConfirmFn) -> Self {
        Self {
            confirm,
            last: None,
            ticks: 0,
        }
    }

    /// Ask the pipeline backend for its status once.
    pub async fn tick(
        &mut self,
        poller: &mut Poller,
        phase: VerificationPhase,
    ) -> Result<(), VerifyError> {
        self.ticks += 1;
        let fut = (self.confirm)();
        match poller.guard(phase, fut).await? {
            Ok(status) => self.observe(status),
            Err(e) => warn!(error = %e, %phase, "pipeline confirmation failed"),
        }
        Ok(())
    }

    fn observe(&mut self, status: PipelineStatus) {
        if self.last.as_ref() == Some(&status) {
            debug!(?status, "pipeline status unchanged");
            return;
        }
        match &status {
            PipelineStatus::Failed(reason) => {
                warn!(%reason, "pipeline reports a failed execution")
            }
            other => info!(status = ?other, "pipeline status changed"),
        }
        self.last = Some(status);
    }

    /// Most recent status the backend answered with.
    pub fn last_status(&self) -> Option<&PipelineStatus> {
        self.last.as_ref()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}
