//! Plan document parser.
//!
//! A plan is YAML (camelCase keys). A `.toml` file is parsed as TOML with
//! the same field names. Condition strings and the selection criterion are
//! parsed during deserialization, so a loaded plan holds no unparsed
//! grammar.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::PlanError;
use crate::selector::SelectionCriterion;

/// Workload kinds the revision watcher knows how to list.
pub const SUPPORTED_KINDS: &[&str] = &["ReplicaSet"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub pipeline_trigger: PipelineTriggerConfig,
    pub cluster: ClusterConfig,
    pub target: TargetConfig,
    pub check_interval_seconds: u64,
    /// Upper bound on one testcase, from baseline selection to the last
    /// checkpoint. Unset means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub testcases: Vec<Testcase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Webhook,
    SpinCli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTriggerConfig {
    pub enabled: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookTriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin_cli: Option<SpinCliTriggerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTriggerConfig {
    pub url: String,
    #[serde(default)]
    pub body: BTreeMap<String, String>,
    /// spin CLI config holding the gate endpoint and cached OAuth2 token.
    /// When set, confirmation polls the gate for the triggered execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin_cli_config: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinCliTriggerConfig {
    pub cert_file_path: PathBuf,
    pub application: String,
    pub pipeline: String,
    #[serde(default = "default_spin_binary")]
    pub binary: String,
}

fn default_spin_binary() -> String {
    "spin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default)]
    pub name: String,
    /// Path to the kubeconfig used to authenticate.
    pub cert_file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub namespace: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub label_selector: BTreeMap<String, String>,
    pub current_version_criteria: SelectionCriterion,
}

fn default_kind() -> String {
    "ReplicaSet".to_string()
}

impl TargetConfig {
    /// Label selector in `k=v,k2=v2` form.
    pub fn selector_string(&self) -> String {
        self.label_selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testcase {
    pub name: String,
    #[serde(rename = "states")]
    pub checkpoints: Vec<Checkpoint>,
}

/// A named bundle of conditions that must all hold before verification
/// moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    #[serde(default)]
    pub pod: PodConditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointCheck>,
}

/// Desired-replica conditions on the incoming and outgoing revisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCheck {
    pub namespace: String,
    pub name: String,
    pub count: Condition,
}

impl Plan {
    /// Load and validate a plan from disk.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        if !path.exists() {
            return Err(PlanError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let plan = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        Ok(plan)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, PlanError> {
        let plan: Plan =
            serde_yaml::from_str(content).map_err(|e| PlanError::Parse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PlanError> {
        let plan: Plan = toml::from_str(content).map_err(|e| PlanError::Parse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Structural checks that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), PlanError> {
        let invalid = |msg: String| Err(PlanError::Invalid(msg));

        if self.check_interval_seconds == 0 {
            return invalid("checkIntervalSeconds must be at least 1".into());
        }
        if self.timeout_seconds == Some(0) {
            return invalid("timeoutSeconds must be at least 1 when set".into());
        }
        if !SUPPORTED_KINDS.contains(&self.target.kind.as_str()) {
            return invalid(format!(
                "target kind {:?} is not supported (expected one of {:?})",
                self.target.kind, SUPPORTED_KINDS
            ));
        }
        if self.target.namespace.is_empty() {
            return invalid("target namespace must not be empty".into());
        }

        let trigger = &self.pipeline_trigger;
        match trigger.enabled {
            TriggerKind::Webhook => match &trigger.webhook {
                None => {
                    return invalid(
                        "pipelineTrigger.webhook is required when enabled is webhook".into(),
                    );
                }
                Some(w) if w.spin_cli_config.is_some() && w.application.is_none() => {
                    return invalid(
                        "pipelineTrigger.webhook.application is required with spinCliConfig"
                            .into(),
                    );
                }
                Some(_) => {}
            },
            TriggerKind::SpinCli => {
                if trigger.spin_cli.is_none() {
                    return invalid(
                        "pipelineTrigger.spinCli is required when enabled is spinCli".into(),
                    );
                }
            }
        }

        if self.testcases.is_empty() {
            return invalid("at least one testcase is required".into());
        }
        for tc in &self.testcases {
            if tc.checkpoints.is_empty() {
                return invalid(format!("testcase {:?} has no states", tc.name));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}
