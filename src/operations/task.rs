//! Batch task state.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier of a batch task.
pub type TaskId = Uuid;

/// Appended to the log when a task succeeds.
pub const DONE_MARKER: &str = "\n\n Done.";

/// Appended to the log after the failure reason when a task fails.
pub const FAILED_MARKER: &str = "\n\n Failed!";

/// A node a batch operation runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNode {
    pub host: String,
    pub port: u16,
    pub group_name: String,
    pub dc: String,
    pub node_id: u32,
}

/// Lifecycle of a batch task.
///
/// `Pending -> Running -> Done | Failed`, or `Pending -> Failed` when the
/// engine refuses the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Claimed, not yet accepted by the engine.
    Pending,
    /// Accepted by the engine.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with a failure.
    Failed,
}

impl TaskStatus {
    /// Whether the task will not change any more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    log: String,
    finished_at: Option<Instant>,
}

/// A named batch operation against the nodes of one group.
#[derive(Debug)]
pub struct BatchTask {
    task_id: TaskId,
    group_name: String,
    operation_name: String,
    tags: String,
    roles: Vec<String>,
    targets: Vec<TargetNode>,
    max_log_bytes: usize,
    started_at: Instant,
    state: Mutex<TaskState>,
}

impl BatchTask {
    /// Create a pending task with a fresh id.
    pub fn new(
        group_name: impl Into<String>,
        operation_name: impl Into<String>,
        tags: impl Into<String>,
        roles: Vec<String>,
        targets: Vec<TargetNode>,
        max_log_bytes: usize,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            group_name: group_name.into(),
            operation_name: operation_name.into(),
            tags: tags.into(),
            roles,
            targets,
            max_log_bytes,
            started_at: Instant::now(),
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                log: String::new(),
                finished_at: None,
            }),
        }
    }

    /// Get the task id.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Get the group this task runs against.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Get the human readable operation name.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Get the tag filter handed to the engine.
    pub fn tags(&self) -> &str {
        &self.tags
    }

    /// Get the role subset, empty for all roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Get the nodes the operation runs against.
    pub fn targets(&self) -> &[TargetNode] {
        &self.targets
    }

    /// Current lifecycle state.
    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    /// Whether the task is `Done` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Accumulated log.
    pub fn log(&self) -> String {
        self.state.lock().log.clone()
    }

    /// Time from creation until the task finished, or until now.
    pub fn elapsed(&self) -> Duration {
        let state = self.state.lock();
        match state.finished_at {
            Some(at) => at.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    /// Append engine output. Ignored once the task is terminal.
    pub fn append_log(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }
        Self::push_capped(&mut state.log, chunk, self.max_log_bytes);
    }

    /// Move from `Pending` to `Running`.
    pub fn mark_running(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != TaskStatus::Pending {
            return false;
        }
        state.status = TaskStatus::Running;
        true
    }

    /// Finish successfully. Returns false if the task was already terminal.
    pub fn mark_done(&self) -> bool {
        self.finish(TaskStatus::Done, DONE_MARKER)
    }

    /// Finish with a failure. The reason lands in the log ahead of the
    /// failure marker.
    pub fn mark_failed(&self, reason: &str) -> bool {
        self.finish(TaskStatus::Failed, &format!("{}{}", reason, FAILED_MARKER))
    }

    fn finish(&self, status: TaskStatus, trailer: &str) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        Self::push_capped(&mut state.log, trailer, self.max_log_bytes);
        state.status = status;
        state.finished_at = Some(Instant::now());
        true
    }

    fn push_capped(log: &mut String, chunk: &str, max_bytes: usize) {
        log.push_str(chunk);
        if log.len() <= max_bytes {
            return;
        }
        let mut cut = log.len() - max_bytes;
        while !log.is_char_boundary(cut) {
            cut += 1;
        }
        log.drain(..cut);
    }

    /// Read-only copy of the task.
    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.state.lock();
        TaskSnapshot {
            task_id: self.task_id,
            group_name: self.group_name.clone(),
            operation_name: self.operation_name.clone(),
            status: state.status,
            log: state.log.clone(),
        }
    }
}

/// Point-in-time view of a [`BatchTask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub group_name: String,
    pub operation_name: String,
    pub status: TaskStatus,
    pub log: String,
}

impl TaskSnapshot {
    /// Whether the task has finished, successfully or not.
    pub fn done(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(max_log_bytes: usize) -> BatchTask {
        BatchTask::new("g1", "restart", "restart", vec![], vec![], max_log_bytes)
    }

    #[test]
    fn test_lifecycle() {
        let t = task(1024);
        assert_eq!(t.status(), TaskStatus::Pending);
        assert!(t.mark_running());
        assert!(!t.mark_running());

        t.append_log("PLAY [all]\n");
        assert!(t.mark_done());
        assert!(t.is_terminal());
        assert_eq!(t.log(), "PLAY [all]\n\n\n Done.");

        // Terminal tasks ignore further changes.
        assert!(!t.mark_failed("late"));
        t.append_log("more");
        assert_eq!(t.status(), TaskStatus::Done);
        assert!(t.log().ends_with(DONE_MARKER));
    }

    #[test]
    fn test_failure_from_pending() {
        let t = task(1024);
        assert!(t.mark_failed("engine refused"));
        assert_eq!(t.status(), TaskStatus::Failed);
        assert_eq!(t.log(), "engine refused\n\n Failed!");
        assert!(t.snapshot().done());
    }

    #[test]
    fn test_log_cap_keeps_tail() {
        let t = task(8);
        t.append_log("0123456789");
        assert_eq!(t.log(), "23456789");

        t.append_log("ab");
        assert_eq!(t.log(), "456789ab");
    }

    #[test]
    fn test_log_cap_respects_char_boundaries() {
        let t = task(5);
        // Each 'é' is two bytes.
        t.append_log("ééé");
        let log = t.log();
        assert!(log.len() <= 5);
        assert_eq!(log, "éé");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(task(16).task_id(), task(16).task_id());
    }
}
