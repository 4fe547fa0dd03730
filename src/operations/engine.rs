//! Execution engine seam.
//!
//! The engine runs a named configuration action (a playbook) against a set of
//! hosts. The orchestrator submits once and then polls until the engine
//! reports completion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::{TargetNode, TaskId};
use crate::error::Result;

/// Opaque handle the engine returns for a submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle(pub String);

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the engine needs to start a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub task_id: TaskId,
    pub group_name: String,
    pub operation_name: String,
    pub targets: Vec<TargetNode>,
    pub vars: serde_json::Map<String, serde_json::Value>,
    pub tags: String,
    pub roles: Vec<String>,
    /// Host inventory rendered by [`render_inventory`].
    pub inventory: String,
}

/// Result of one progress poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionProgress {
    /// Output produced since the previous poll.
    pub log: String,
    /// The run has finished.
    pub done: bool,
    /// Set when the run finished unsuccessfully.
    pub failure: Option<String>,
}

impl ExecutionProgress {
    /// Still running, with `log` produced since the last poll.
    pub fn running(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            done: false,
            failure: None,
        }
    }

    /// Finished successfully.
    pub fn succeeded(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            done: true,
            failure: None,
        }
    }

    /// Finished unsuccessfully with `reason`.
    pub fn failed(log: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            done: true,
            failure: Some(reason.into()),
        }
    }
}

/// External runner for batch operations.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    /// Start a run. An error means the run never started.
    async fn submit_execution(&self, request: ExecutionRequest) -> Result<ExecutionHandle>;

    /// Report progress of a run.
    async fn poll_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionProgress>;
}

/// Render the host inventory for `targets`.
///
/// ```text
/// [hosts]
/// 10.0.0.1 group_name=g1 node_id=1 dc=dc1 ansible_ssh_port=22
/// ```
pub fn render_inventory(targets: &[TargetNode], ssh_port: u16) -> String {
    let mut out = String::from("[hosts]\n");
    for t in targets {
        out.push_str(&format!(
            "{} group_name={} node_id={} dc={} ansible_ssh_port={}\n",
            t.host, t.group_name, t.node_id, t.dc, ssh_port
        ));
    }
    out
}
