//! Error types for rollout verification.

use thiserror::Error;

use astrolabe_cluster::ClusterError;
use astrolabe_core::SelectionError;
use astrolabe_trigger::TriggerError;

use crate::controller::VerificationPhase;

/// A single checkpoint attempt could not be evaluated. Always retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The endpoint object is missing or has no address subsets yet.
    #[error("endpoint {namespace}/{name} is unavailable")]
    EndpointUnavailable { namespace: String, name: String },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Verification stopped. Every variant is fatal to the run.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("revision selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The trigger could not be built, so nothing was pulled.
    #[error("failed to set up the deploy pipeline trigger: {0}")]
    TriggerSetup(TriggerError),

    #[error("failed to pull trigger of deploy pipeline: {0}")]
    Trigger(#[from] TriggerError),

    #[error("timed out while {phase}")]
    Timeout { phase: VerificationPhase },

    #[error("verification cancelled")]
    Cancelled,
}
