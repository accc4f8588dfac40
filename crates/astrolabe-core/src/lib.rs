//! astrolabe-core — shared types for rollout verification.
//!
//! - **`plan`** — the plan document: target selector, trigger, testcases
//! - **`condition`** — the `N` / `>N` / `<N` count grammar
//! - **`selector`** — picking the current or newest revision
//! - **`types`** — revision and endpoint snapshots

pub mod condition;
pub mod error;
pub mod plan;
pub mod selector;
pub mod types;

pub use condition::{evaluate, Condition};
pub use error::{ConditionSyntaxError, PlanError, SelectionError};
pub use plan::{
    Checkpoint, ClusterConfig, EndpointCheck, PipelineTriggerConfig, Plan, PodConditions,
    SpinCliTriggerConfig, TargetConfig, Testcase, TriggerKind, WebhookTriggerConfig,
};
pub use selector::{select, select_by_name, SelectionCriterion};
pub use types::{EndpointSnapshot, EndpointSubset, RevisionSnapshot};
