//! Error types for cluster access.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Credentials are missing or unusable. Fatal.
    #[error("cluster authentication failed: {0}")]
    Auth(String),

    /// A list/get call failed. Transient inside the wait loops.
    #[error("cluster API error: {0}")]
    Api(String),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
}
