//! Error types for pipeline triggers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// The trigger could not be built from its configuration.
    #[error("trigger configuration error: {0}")]
    Config(String),

    /// An HTTP call to the pipeline backend failed or returned garbage.
    #[error("trigger request failed: {0}")]
    Request(String),

    /// A delegated pipeline-tool invocation failed.
    #[error("pipeline command failed: {0}")]
    Command(String),
}
