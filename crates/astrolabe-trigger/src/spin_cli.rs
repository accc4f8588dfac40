//! spin CLI trigger — delegate pipeline start and status to `spin`.
//!
//! `pull` resolves the pipeline id with `pipeline get`, then starts it with
//! `pipeline execute`. Confirmation runs `pipeline execution list` for that
//! id and reports the newest execution's status.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, info};

use astrolabe_core::SpinCliTriggerConfig;

use crate::{
    first_execution_status, ConfirmFn, PipelineStatus, PipelineTrigger, TriggerError,
    TriggerFuture,
};

/// Pipeline trigger backed by the spin CLI.
pub struct SpinCliTrigger {
    spin: SpinCommand,
    application: String,
    pipeline: String,
}

/// A spin binary bound to one config file.
#[derive(Debug, Clone)]
struct SpinCommand {
    binary: String,
    config_path: PathBuf,
}

impl SpinCommand {
    /// Run spin with `args` and return its stdout. Any non-zero exit is an
    /// error, including stderr in the message.
    async fn run(&self, args: &[&str]) -> Result<String, TriggerError> {
        debug!(binary = %self.binary, ?args, "running pipeline command");
        let output = Command::new(&self.binary)
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .output()
            .await
            .map_err(|e| TriggerError::Command(format!("failed to execute {}: {e}", self.binary)))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TriggerError::Command(format!(
                "{} {} exited with code {code}: {}",
                self.binary,
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn latest_execution(&self, pipeline_id: &str) -> Result<PipelineStatus, TriggerError> {
        let out = self
            .run(&["pipeline", "execution", "list", "--pipeline-id", pipeline_id, "--limit", "1"])
            .await?;
        let executions: serde_json::Value = serde_json::from_str(&out)
            .map_err(|e| TriggerError::Command(format!("unreadable execution list: {e}")))?;
        Ok(first_execution_status(&executions))
    }
}

impl SpinCliTrigger {
    pub fn new(config: &SpinCliTriggerConfig) -> Self {
        Self {
            spin: SpinCommand {
                binary: config.binary.clone(),
                config_path: config.cert_file_path.clone(),
            },
            application: config.application.clone(),
            pipeline: config.pipeline.clone(),
        }
    }

    async fn resolve_pipeline_id(&self) -> Result<String, TriggerError> {
        let out = self
            .spin
            .run(&["pipeline", "get", "--application", &self.application, "--name", &self.pipeline])
            .await?;
        let pipeline: serde_json::Value = serde_json::from_str(&out)
            .map_err(|e| TriggerError::Command(format!("unreadable pipeline definition: {e}")))?;
        pipeline
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TriggerError::Command(format!(
                    "pipeline {}/{} has no id",
                    self.application, self.pipeline
                ))
            })
    }
}

impl PipelineTrigger for SpinCliTrigger {
    fn kind(&self) -> &'static str {
        "spinCli"
    }

    fn pull(&mut self) -> TriggerFuture<'_, ConfirmFn> {
        Box::pin(async move {
            if !self.spin.config_path.exists() {
                return Err(TriggerError::Config(format!(
                    "{} does not exist",
                    self.spin.config_path.display()
                )));
            }

            let pipeline_id = self.resolve_pipeline_id().await?;
            self.spin
                .run(&[
                    "pipeline",
                    "execute",
                    "--application",
                    &self.application,
                    "--name",
                    &self.pipeline,
                ])
                .await?;

            info!(
                application = %self.application,
                pipeline = %self.pipeline,
                %pipeline_id,
                "pipeline execution started"
            );
            let spin = self.spin.clone();
            let confirm: ConfirmFn = Box::new(move || -> TriggerFuture<'static, PipelineStatus> {
                let spin = spin.clone();
                let pipeline_id = pipeline_id.clone();
                Box::pin(async move { spin.latest_execution(&pipeline_id).await })
            });
            Ok(confirm)
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Install a stand-in for the spin binary that answers by subcommand.
    fn fake_spin(dir: &Path, script_body: &str) -> String {
        let path = dir.join("spin");
        std::fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    const HAPPY_SPIN: &str = r#"
case "$*" in
  *"pipeline get"*) echo '{"id":"pipe-1","name":"deploy"}' ;;
  *"execution list --pipeline-id pipe-1 "*) echo '[{"id":"ex-1","status":"SUCCEEDED"}]' ;;
  *"pipeline execute"*) echo 'started' ;;
  *) echo "unexpected: $*" >&2; exit 3 ;;
esac"#;

    fn trigger(dir: &Path, binary: String) -> SpinCliTrigger {
        let config_path = dir.join("spin-config");
        std::fs::write(&config_path, "gate:\n  endpoint: http://gate\n").unwrap();
        SpinCliTrigger::new(&SpinCliTriggerConfig {
            cert_file_path: config_path,
            application: "web".into(),
            pipeline: "deploy".into(),
            binary,
        })
    }

    #[tokio::test]
    async fn pull_resolves_id_and_confirm_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut trigger = trigger(dir.path(), fake_spin(dir.path(), HAPPY_SPIN));

        // The fake only answers the execution list for the resolved id.
        let mut confirm = trigger.pull().await.unwrap();
        assert_eq!(confirm().await.unwrap(), PipelineStatus::Succeeded);
    }

    #[tokio::test]
    async fn failing_execute_fails_the_pull() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"
case "$*" in
  *"pipeline get"*) echo '{"id":"pipe-1"}' ;;
  *) echo "forbidden" >&2; exit 1 ;;
esac"#;
        let mut trigger = trigger(dir.path(), fake_spin(dir.path(), script));

        let err = trigger.pull().await.err().unwrap();
        match err {
            TriggerError::Command(msg) => assert!(msg.contains("forbidden")),
            other => panic!("expected Command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pipeline_without_id_fails_the_pull() {
        let dir = tempfile::tempdir().unwrap();
        let mut trigger = trigger(dir.path(), fake_spin(dir.path(), "echo '{}'"));
        assert!(matches!(trigger.pull().await, Err(TriggerError::Command(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_a_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut trigger = trigger(dir.path(), "/nonexistent/bin/spin".into());
        assert!(matches!(trigger.pull().await, Err(TriggerError::Command(_))));
    }

    #[tokio::test]
    async fn missing_config_is_a_config_error() {
        let mut trigger = SpinCliTrigger::new(&SpinCliTriggerConfig {
            cert_file_path: "/nonexistent/spin/config".into(),
            application: "web".into(),
            pipeline: "deploy".into(),
            binary: "spin".into(),
        });
        assert!(matches!(trigger.pull().await, Err(TriggerError::Config(_))));
    }
}
