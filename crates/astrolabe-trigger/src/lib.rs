//! astrolabe-trigger — start and monitor an external deployment pipeline.
//!
//! A [`PipelineTrigger`] starts the pipeline once per testcase via
//! [`PipelineTrigger::pull`] and hands back a [`ConfirmFn`]. The caller
//! invokes that callback on every poll tick while it waits for the
//! rollout; the reported [`PipelineStatus`] is advisory and never gates
//! the verification itself.
//!
//! # Variants
//!
//! - **`webhook`** — POST a JSON body to a pipeline webhook, capture the
//!   returned event id, optionally poll the gate API for its execution.
//! - **`spin_cli`** — delegate start and status queries to the `spin` CLI.

pub mod error;
pub mod spin_cli;
pub mod webhook;

use std::future::Future;
use std::pin::Pin;

use astrolabe_core::{PipelineTriggerConfig, TriggerKind};

pub use error::TriggerError;
pub use spin_cli::SpinCliTrigger;
pub use webhook::WebhookTrigger;

/// Boxed future returned by trigger operations.
pub type TriggerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TriggerError>> + Send + 'a>>;

/// Confirmation callback returned by [`PipelineTrigger::pull`].
///
/// Owns whatever session state it needs (event id, token), so it stays
/// valid independently of the trigger that produced it.
pub type ConfirmFn = Box<dyn FnMut() -> TriggerFuture<'static, PipelineStatus> + Send>;

/// Progress of the triggered pipeline as last reported by its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Running,
    Succeeded,
    /// Terminal failure, with the backend's status string.
    Failed(String),
    /// The backend gave no usable answer (or offers no status at all).
    Unknown,
}

impl PipelineStatus {
    /// Map a Spinnaker execution status string.
    pub fn from_execution_status(status: &str) -> Self {
        match status {
            "NOT_STARTED" | "RUNNING" | "PAUSED" | "SUSPENDED" | "BUFFERED" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "TERMINAL" | "CANCELED" | "STOPPED" | "FAILED_CONTINUE" => {
                Self::Failed(status.to_string())
            }
            _ => Self::Unknown,
        }
    }
}

/// Starts an external deployment pipeline.
pub trait PipelineTrigger: Send {
    /// Short name for logs.
    fn kind(&self) -> &'static str;

    /// Start the pipeline. Errors here are fatal to the testcase: nothing
    /// was deployed, so there is nothing to verify.
    fn pull(&mut self) -> TriggerFuture<'_, ConfirmFn>;
}

/// Build the trigger selected by `enabled` in the plan.
pub fn from_config(
    config: &PipelineTriggerConfig,
) -> Result<Box<dyn PipelineTrigger>, TriggerError> {
    match config.enabled {
        TriggerKind::Webhook => {
            let webhook = config.webhook.as_ref().ok_or_else(|| {
                TriggerError::Config("webhook trigger enabled without a webhook section".into())
            })?;
            Ok(Box::new(WebhookTrigger::new(webhook)?))
        }
        TriggerKind::SpinCli => {
            let cli = config.spin_cli.as_ref().ok_or_else(|| {
                TriggerError::Config("spinCli trigger enabled without a spinCli section".into())
            })?;
            Ok(Box::new(SpinCliTrigger::new(cli)))
        }
    }
}

/// Pull the status of the most recent execution out of a JSON array of
/// executions.
pub(crate) fn first_execution_status(executions: &serde_json::Value) -> PipelineStatus {
    executions
        .as_array()
        .and_then(|list| list.first())
        .and_then(|exec| exec.get("status"))
        .and_then(|s| s.as_str())
        .map(PipelineStatus::from_execution_status)
        .unwrap_or(PipelineStatus::Unknown)
}
