//! Plan loading and the verification run behind the `astrolabe` binary.

use std::path::Path;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use astrolabe_cluster::KubeCluster;
use astrolabe_core::Plan;
use astrolabe_rollout::{Orchestrator, VerificationReport};

pub fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let plan = Plan::from_file(path)?;
    info!(
        path = %path.display(),
        testcases = plan.testcases.len(),
        trigger = ?plan.pipeline_trigger.enabled,
        "plan loaded"
    );
    Ok(plan)
}

/// Load the plan, connect to the cluster and verify every testcase.
pub async fn run(path: &Path) -> anyhow::Result<()> {
    let plan = load_plan(path)?;
    let cluster = KubeCluster::connect(&plan.cluster)
        .await
        .context("failed to connect to the cluster")?;
    info!(cluster = %plan.cluster.name, namespace = %plan.target.namespace, "connected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to install CTRL+C handler"),
        }
    });

    let mut orchestrator = Orchestrator::from_plan(&plan, &cluster, shutdown_rx);
    let report = orchestrator
        .run(&plan.testcases, || astrolabe_trigger::from_config(&plan.pipeline_trigger))
        .await?;

    log_report(&report);
    Ok(())
}

fn log_report(report: &VerificationReport) {
    for tc in &report.testcases {
        let attempts: u32 = tc.checkpoints.iter().map(|c| c.attempts).sum();
        info!(
            testcase = %tc.name,
            current = %tc.current,
            baseline = %tc.baseline,
            incoming = %tc.incoming,
            checkpoints = tc.checkpoints.len(),
            attempts,
            pipeline = ?tc.pipeline_status,
            confirmations = tc.confirmations,
            elapsed_secs = tc.elapsed.as_secs(),
            "testcase verified"
        );
    }
    info!(
        testcases = report.testcases.len(),
        elapsed_secs = report.elapsed.as_secs(),
        "all testcases verified"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
pipelineTrigger:
  enabled: webhook
  webhook:
    url: http://localhost:8084/webhooks/webhook/deploy
    body: { key: value }
cluster:
  certFilePath: /nonexistent/kubeconfig
target:
  namespace: default
  labelSelector: { app: web }
  currentVersionCriteria: largest
checkIntervalSeconds: 1
testcases:
  - name: canary
    states:
      - name: up
        pod: { new: ">0" }
"#;

    #[test]
    fn loads_a_valid_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN).unwrap();
        assert_eq!(load_plan(&path).unwrap().testcases.len(), 1);
    }

    #[test]
    fn missing_plan_is_reported_in_one_line() {
        let err = load_plan(Path::new("/nonexistent/plan.yaml")).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("does not exist"));
        assert!(!msg.contains('\n'));
    }

    #[test]
    fn malformed_condition_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN.replace("\">0\"", "\"=3\"")).unwrap();
        let msg = format!("{:#}", load_plan(&path).unwrap_err());
        assert!(msg.contains("=3"), "{msg}");
    }

    #[tokio::test]
    async fn missing_kubeconfig_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN).unwrap();
        let msg = format!("{:#}", run(&path).await.unwrap_err());
        assert!(msg.starts_with("failed to connect to the cluster"), "{msg}");
    }
}
