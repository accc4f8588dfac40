//! Checkpoint evaluation against one pair of revisions.
//!
//! Sub-checks run in order: pod count of the incoming revision, pod count
//! of the current revision, then each endpoint. The first failing sub-check
//! ends the attempt.

use tracing::debug;

use astrolabe_cluster::{ClusterApi, ClusterError};
use astrolabe_core::{Checkpoint, Condition, EndpointCheck, RevisionSnapshot};

use crate::error::CheckError;

/// Evaluate `checkpoint` once.
///
/// `Ok(false)` means a well-formed condition does not hold yet. Errors are
/// reserved for fetch failures and unavailable endpoints.
pub async fn check(
    checkpoint: &Checkpoint,
    current: &RevisionSnapshot,
    incoming: &RevisionSnapshot,
    cluster: &dyn ClusterApi,
) -> Result<bool, CheckError> {
    if !pods_match(checkpoint, "new", checkpoint.pod.new, incoming)
        || !pods_match(checkpoint, "current", checkpoint.pod.current, current)
    {
        return Ok(false);
    }

    for endpoint in &checkpoint.endpoints {
        if !endpoint_matches(endpoint, cluster).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn pods_match(
    checkpoint: &Checkpoint,
    role: &str,
    condition: Option<Condition>,
    revision: &RevisionSnapshot,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let observed = u64::from(revision.desired_replicas);
    let ok = condition.matches(observed);
    if !ok {
        debug!(
            checkpoint = %checkpoint.name,
            role,
            revision = %revision.name,
            observed,
            %condition,
            "pod count condition not met"
        );
    }
    ok
}

async fn endpoint_matches(
    check: &EndpointCheck,
    cluster: &dyn ClusterApi,
) -> Result<bool, CheckError> {
    let unavailable = || CheckError::EndpointUnavailable {
        namespace: check.namespace.clone(),
        name: check.name.clone(),
    };

    let endpoint = match cluster.get_endpoint(&check.namespace, &check.name).await {
        Ok(ep) => ep,
        Err(ClusterError::NotFound { .. }) => return Err(unavailable()),
        Err(e) => return Err(e.into()),
    };
    let Some(count) = endpoint.first_subset_addresses() else {
        return Err(unavailable());
    };

    let observed = count as u64;
    let ok = check.count.matches(observed);
    if !ok {
        debug!(
            endpoint = %format!("{}/{}", check.namespace, check.name),
            observed,
            condition = %check.count,
            "endpoint address count condition not met"
        );
    }
    Ok(ok)
}
