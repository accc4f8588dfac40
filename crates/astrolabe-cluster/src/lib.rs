//! astrolabe-cluster — read-only access to the cluster under observation.
//!
//! The verification engine only needs two calls: list the revisions
//! matching a label selector, and get one endpoint object. Both sit
//! behind [`ClusterApi`] so the engine can run against [`KubeCluster`]
//! in production and [`FakeCluster`] in tests.

pub mod error;
pub mod fakes;
pub mod kube_cluster;

use std::future::Future;
use std::pin::Pin;

use astrolabe_core::{EndpointSnapshot, RevisionSnapshot};

pub use error::ClusterError;
pub use fakes::FakeCluster;
pub use kube_cluster::KubeCluster;

/// Boxed future returned by [`ClusterApi`] methods.
pub type ClusterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClusterError>> + Send + 'a>>;

/// Read-only cluster operations used by the watcher and checker.
pub trait ClusterApi: Send + Sync {
    /// List workload revisions in `namespace` matching `selector`
    /// (`k=v,k2=v2`; empty matches everything).
    fn list_revisions<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
    ) -> ClusterFuture<'a, Vec<RevisionSnapshot>>;

    /// Get one endpoint object by namespace and name.
    fn get_endpoint<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> ClusterFuture<'a, EndpointSnapshot>;
}
