//! Point-in-time observations of cluster objects.
//!
//! Snapshots are never mutated; every poll tick fetches a fresh set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One workload revision (a ReplicaSet) as observed at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSnapshot {
    pub name: String,
    /// Desired replica count from the revision's spec.
    pub desired_replicas: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl RevisionSnapshot {
    pub fn new(name: &str, desired_replicas: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            desired_replicas,
            created_at,
            labels: BTreeMap::new(),
        }
    }
}

/// A network endpoint object and the addresses registered in each subset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub namespace: String,
    pub name: String,
    pub subsets: Vec<EndpointSubset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointSubset {
    /// Ready addresses (IPs) in this subset.
    pub addresses: Vec<String>,
}

impl EndpointSnapshot {
    /// Number of addresses in the first subset, or `None` when the object
    /// has no subsets at all.
    pub fn first_subset_addresses(&self) -> Option<usize> {
        self.subsets.first().map(|s| s.addresses.len())
    }
}
