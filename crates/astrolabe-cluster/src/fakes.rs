//! In-memory fake for [`ClusterApi`] (testing only).
//!
//! Revision listings are scripted: each call pops the next queued
//! response, and the last one repeats once the queue is drained. Endpoint
//! lookups fail once per queued endpoint error before the stored endpoints
//! are served.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use astrolabe_core::{EndpointSnapshot, RevisionSnapshot};

use crate::{ClusterApi, ClusterError, ClusterFuture};

#[derive(Debug, Default)]
pub struct FakeCluster {
    revisions: Mutex<VecDeque<Result<Vec<RevisionSnapshot>, ClusterError>>>,
    endpoints: Mutex<HashMap<(String, String), EndpointSnapshot>>,
    endpoint_errors: Mutex<VecDeque<ClusterError>>,
    list_calls: AtomicUsize,
    endpoint_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful revision listing.
    pub fn push_revisions(&self, revisions: Vec<RevisionSnapshot>) -> &Self {
        self.revisions.lock().unwrap().push_back(Ok(revisions));
        self
    }

    /// Queue a failed revision listing.
    pub fn push_error(&self, err: ClusterError) -> &Self {
        self.revisions.lock().unwrap().push_back(Err(err));
        self
    }

    /// Fail the next endpoint lookup with `err`.
    pub fn push_endpoint_error(&self, err: ClusterError) -> &Self {
        self.endpoint_errors.lock().unwrap().push_back(err);
        self
    }

    pub fn set_endpoint(&self, endpoint: EndpointSnapshot) {
        let key = (endpoint.namespace.clone(), endpoint.name.clone());
        self.endpoints.lock().unwrap().insert(key, endpoint);
    }

    pub fn remove_endpoint(&self, namespace: &str, name: &str) {
        self.endpoints
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Number of `list_revisions` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_endpoint` calls served so far.
    pub fn endpoint_calls(&self) -> usize {
        self.endpoint_calls.load(Ordering::SeqCst)
    }
}

impl ClusterApi for FakeCluster {
    fn list_revisions<'a>(
        &'a self,
        _namespace: &'a str,
        _selector: &'a str,
    ) -> ClusterFuture<'a, Vec<RevisionSnapshot>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.revisions.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        let result = next.unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { result })
    }

    fn get_endpoint<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> ClusterFuture<'a, EndpointSnapshot> {
        self.endpoint_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.endpoint_errors.lock().unwrap().pop_front();
        let result = match queued {
            Some(err) => Err(err),
            None => self
                .endpoints
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| ClusterError::NotFound {
                    kind: "Endpoints",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }),
        };
        Box::pin(async move { result })
    }
}
