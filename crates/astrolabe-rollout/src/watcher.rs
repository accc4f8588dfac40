//! Revision listing and the wait-for-new-revision loop.

use tracing::{debug, info, warn};

use astrolabe_cluster::{ClusterApi, ClusterError};
use astrolabe_core::{select, RevisionSnapshot, SelectionCriterion, TargetConfig};

use crate::controller::VerificationPhase;
use crate::error::VerifyError;
use crate::monitor::PipelineMonitor;
use crate::poller::Poller;

/// Reads the revisions of one target workload.
pub struct RolloutWatcher<'a> {
    cluster: &'a dyn ClusterApi,
    target: &'a TargetConfig,
    selector: String,
}

impl<'a> RolloutWatcher<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, target: &'a TargetConfig) -> Self {
        Self {
            cluster,
            target,
            selector: target.selector_string(),
        }
    }

    pub async fn list(&self) -> Result<Vec<RevisionSnapshot>, ClusterError> {
        let revisions = self
            .cluster
            .list_revisions(&self.target.namespace, &self.selector)
            .await?;
        debug!(
            namespace = %self.target.namespace,
            selector = %self.selector,
            count = revisions.len(),
            "listed revisions"
        );
        Ok(revisions)
    }

    /// The newest revision, or `None` when nothing matches the selector.
    pub async fn newest(&self) -> Result<Option<RevisionSnapshot>, ClusterError> {
        let revisions = self.list().await?;
        Ok(select(&revisions, SelectionCriterion::Newest).ok().cloned())
    }

    /// Re-read the current and incoming revisions by name.
    ///
    /// A revision that no longer exists reads as scaled to zero.
    pub async fn refresh_pair(
        &self,
        current: &RevisionSnapshot,
        incoming: &RevisionSnapshot,
    ) -> Result<(RevisionSnapshot, RevisionSnapshot), ClusterError> {
        let revisions = self.list().await?;
        let find = |prev: &RevisionSnapshot| {
            revisions
                .iter()
                .find(|r| r.name == prev.name)
                .cloned()
                .unwrap_or_else(|| {
                    debug!(revision = %prev.name, "revision gone, treating as scaled to zero");
                    RevisionSnapshot {
                        desired_replicas: 0,
                        ..prev.clone()
                    }
                })
        };
        Ok((find(current), find(incoming)))
    }

    /// Poll until the newest revision is something other than `baseline`.
    ///
    /// Fetch errors and empty listings are logged and retried. Only the
    /// poller's deadline or shutdown ends the wait early.
    pub async fn wait_for_new_revision(
        &self,
        baseline: &str,
        poller: &mut Poller,
        monitor: &mut PipelineMonitor,
    ) -> Result<RevisionSnapshot, VerifyError> {
        let phase = VerificationPhase::WaitingForRevision;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match poller.guard(phase, self.newest()).await? {
                Ok(Some(newest)) if newest.name != baseline => {
                    info!(%baseline, revision = %newest.name, attempt, "new revision observed");
                    return Ok(newest);
                }
                Ok(Some(_)) => debug!(%baseline, attempt, "no new revision yet"),
                Ok(None) => warn!(
                    namespace = %self.target.namespace,
                    selector = %self.selector,
                    attempt,
                    "no revisions match the selector"
                ),
                Err(e) => warn!(error = %e, attempt, "failed to list revisions"),
            }

            poller.pause(phase).await?;
            monitor.tick(poller, phase).await?;
        }
    }
}
