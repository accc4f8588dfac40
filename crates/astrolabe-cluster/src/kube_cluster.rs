//! [`ClusterApi`] backed by a kube-rs client.

use std::path::Path;

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Endpoints;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, info};

use astrolabe_core::{ClusterConfig, EndpointSnapshot, EndpointSubset, RevisionSnapshot};

use crate::{ClusterApi, ClusterError, ClusterFuture};

/// Cluster access through the Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Authenticate with the kubeconfig named by the plan's cluster section.
    pub async fn connect(config: &ClusterConfig) -> Result<Self, ClusterError> {
        let path = config.cert_file_path.as_path();
        let kubeconfig = read_kubeconfig(path)?;

        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };
        let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| ClusterError::Auth(e.to_string()))?;
        let client =
            Client::try_from(client_config).map_err(|e| ClusterError::Auth(e.to_string()))?;

        info!(
            cluster = %config.name,
            kubeconfig = %path.display(),
            "connected to cluster"
        );
        Ok(Self { client })
    }
}

fn read_kubeconfig(path: &Path) -> Result<Kubeconfig, ClusterError> {
    if !path.exists() {
        return Err(ClusterError::Auth(format!("{} does not exist", path.display())));
    }
    Kubeconfig::read_from(path).map_err(|e| ClusterError::Auth(e.to_string()))
}

impl ClusterApi for KubeCluster {
    fn list_revisions<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
    ) -> ClusterFuture<'a, Vec<RevisionSnapshot>> {
        Box::pin(async move {
            let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
            let mut params = ListParams::default();
            if !selector.is_empty() {
                params = params.labels(selector);
            }

            let list = api
                .list(&params)
                .await
                .map_err(|e| ClusterError::Api(e.to_string()))?;
            debug!(%namespace, %selector, count = list.items.len(), "listed replicasets");

            Ok(list.items.iter().map(revision_from_replicaset).collect())
        })
    }

    fn get_endpoint<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> ClusterFuture<'a, EndpointSnapshot> {
        Box::pin(async move {
            let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
            match api.get(name).await {
                Ok(ep) => Ok(endpoint_from_endpoints(namespace, name, &ep)),
                Err(kube::Error::Api(ae)) if ae.code == 404 => Err(ClusterError::NotFound {
                    kind: "Endpoints",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }),
                Err(e) => Err(ClusterError::Api(e.to_string())),
            }
        })
    }
}

fn revision_from_replicaset(rs: &ReplicaSet) -> RevisionSnapshot {
    let desired_replicas = rs
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(0);
    let created_at = rs
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    RevisionSnapshot {
        name: rs.metadata.name.clone().unwrap_or_default(),
        desired_replicas,
        created_at,
        labels: rs.metadata.labels.clone().unwrap_or_default(),
    }
}

fn endpoint_from_endpoints(namespace: &str, name: &str, ep: &Endpoints) -> EndpointSnapshot {
    let subsets = ep
        .subsets
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|subset| EndpointSubset {
            addresses: subset
                .addresses
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|addr| addr.ip.clone())
                .collect(),
        })
        .collect();

    EndpointSnapshot {
        namespace: namespace.to_string(),
        name: name.to_string(),
        subsets,
    }
}
