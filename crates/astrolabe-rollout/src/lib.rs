//! astrolabe-rollout — verify a canary rollout against a live cluster.
//!
//! Per testcase the orchestrator selects a baseline revision, starts the
//! deployment pipeline, waits for a new revision to appear, then polls
//! each checkpoint until its conditions hold.
//!
//! # Components
//!
//! - **`poller`** — poll interval, deadline and cancellation for every wait
//! - **`watcher`** — revision listing and the wait-for-new-revision loop
//! - **`checker`** — one checkpoint's pod and endpoint conditions
//! - **`monitor`** — advisory pipeline confirmation on every tick
//! - **`controller`** — the per-testcase state machine
//!
//! ```text
//! Orchestrator
//!   ├── SelectingBaseline   list revisions, pick current + newest
//!   ├── Triggering          PipelineTrigger::pull → ConfirmFn
//!   ├── WaitingForRevision  RolloutWatcher (newest != baseline)
//!   └── CheckingCheckpoint  checker::check until pass, per checkpoint
//! ```

pub mod checker;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod poller;
pub mod watcher;

pub use checker::check;
pub use controller::{
    CheckpointReport, Orchestrator, TestcaseReport, VerificationPhase, VerificationReport,
};
pub use error::{CheckError, VerifyError};
pub use monitor::PipelineMonitor;
pub use poller::Poller;
pub use watcher::RolloutWatcher;
