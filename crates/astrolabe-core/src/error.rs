//! Error types for plan loading, condition parsing and revision selection.

use std::path::PathBuf;

use thiserror::Error;

/// A condition string matched none of `N`, `>N` or `<N`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition {input:?}: expected N, >N or <N with N a non-negative integer")]
pub struct ConditionSyntaxError {
    pub input: String,
}

/// Revision selection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no revisions matched the target selector")]
    Empty,

    #[error("unknown selection criterion {0:?}: expected \"largest\" or \"newest\"")]
    UnknownCriterion(String),
}

/// Errors raised while loading a plan document.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan: {0}")]
    Parse(String),

    #[error("invalid plan: {0}")]
    Invalid(String),
}
