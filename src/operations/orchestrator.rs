//! Single-flight batch operation orchestration.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::engine::{render_inventory, ExecutionEngine, ExecutionRequest};
use super::registry::OperationRegistry;
use super::task::{BatchTask, TargetNode, TaskId, TaskSnapshot, TaskStatus};
use crate::config::OrchestratorConfig;
use crate::error::{Error, ExecutionError, Result, ValidationError};
use crate::metrics::ControlPlaneMetrics;
use crate::types::validate_group_name;

/// Failure reason recorded when the worker dies without finishing the task.
pub const WORKER_PANICKED: &str = "execution worker panicked";

/// A batch operation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSubmission {
    /// Nodes to run against. All must belong to one group.
    pub targets: Vec<TargetNode>,
    /// Free-form variables handed to the engine.
    pub vars: serde_json::Map<String, serde_json::Value>,
    /// Tag filter; must be one of the supported tags.
    pub tags: String,
    /// Optional role subset.
    pub roles: Vec<String>,
    pub operation_name: String,
}

/// Runs batch operations, at most one live per group.
///
/// Submission validates, claims the group's slot in the shared
/// [`OperationRegistry`] and hands the run to a background worker; it never
/// waits for the engine. Engine failures end up in the task log.
#[derive(Debug, Clone)]
pub struct BatchOperationOrchestrator {
    registry: Arc<OperationRegistry>,
    engine: Arc<dyn ExecutionEngine>,
    config: OrchestratorConfig,
    metrics: Arc<ControlPlaneMetrics>,
}

impl BatchOperationOrchestrator {
    /// Create an orchestrator over a shared task registry.
    pub fn new(
        registry: Arc<OperationRegistry>,
        engine: Arc<dyn ExecutionEngine>,
        config: OrchestratorConfig,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            registry,
            engine,
            config,
            metrics,
        }
    }

    /// Get the task registry.
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Validate a submission, returning the group it targets.
    pub fn validate(
        &self,
        submission: &BatchSubmission,
    ) -> std::result::Result<String, ValidationError> {
        let first = submission
            .targets
            .first()
            .ok_or(ValidationError::NoTargetNodes)?;
        let group = first.group_name.clone();
        validate_group_name(&group)?;

        if let Some(other) = submission.targets.iter().find(|t| t.group_name != group) {
            return Err(ValidationError::MixedGroups {
                first: group,
                other: other.group_name.clone(),
            });
        }
        if !self.config.supports_tags(&submission.tags) {
            return Err(ValidationError::UnsupportedTags(submission.tags.clone()));
        }
        if submission.operation_name.trim().is_empty() {
            return Err(ValidationError::EmptyOperationName);
        }
        Ok(group)
    }

    /// Start a batch operation and return its id without waiting for it.
    ///
    /// Fails with [`Error::Conflict`] if the group already has a live task.
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, submission: BatchSubmission) -> Result<TaskId> {
        let group = self.validate(&submission)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("no async runtime for batch worker: {}", e)))?;

        let BatchSubmission {
            targets,
            vars,
            tags,
            roles,
            operation_name,
        } = submission;

        let task = BatchTask::new(
            group.clone(),
            operation_name,
            tags,
            roles,
            targets,
            self.config.max_log_bytes,
        );
        let task = match self.registry.claim(task) {
            Ok(task) => task,
            Err(e) => {
                if e.is_conflict() {
                    self.metrics.batch_conflicts.inc();
                    tracing::warn!(group = %group, error = %e, "Batch operation refused");
                }
                return Err(e);
            }
        };

        self.metrics.batch_submitted.inc();
        self.metrics.batch_live.inc();
        tracing::info!(
            group = %group,
            task_id = %task.task_id(),
            operation = task.operation_name(),
            tags = task.tags(),
            targets = task.targets().len(),
            "Batch operation claimed"
        );

        let request = ExecutionRequest {
            task_id: task.task_id(),
            group_name: group,
            operation_name: task.operation_name().to_string(),
            targets: task.targets().to_vec(),
            vars,
            tags: task.tags().to_string(),
            roles: task.roles().to_vec(),
            inventory: render_inventory(task.targets(), self.config.ssh_port),
        };

        let task_id = task.task_id();
        let worker = BatchWorker {
            task,
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        runtime.spawn(worker.run(request));

        Ok(task_id)
    }

    /// Current task of `group_name`, if any.
    pub fn poll(&self, group_name: &str) -> Result<Option<TaskSnapshot>> {
        validate_group_name(group_name)?;
        Ok(self.registry.snapshot(group_name))
    }
}

/// Drives one task from submission to a terminal state.
struct BatchWorker {
    task: Arc<BatchTask>,
    engine: Arc<dyn ExecutionEngine>,
    config: OrchestratorConfig,
    metrics: Arc<ControlPlaneMetrics>,
}

impl BatchWorker {
    #[tracing::instrument(
        name = "batch_worker",
        skip_all,
        fields(group = %self.task.group_name(), task_id = %self.task.task_id())
    )]
    async fn run(self, request: ExecutionRequest) {
        if AssertUnwindSafe(self.drive(request))
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!("Execution worker panicked");
        }
        // A panic or an early exit must still release the group.
        if !self.task.is_terminal() {
            self.task.mark_failed(WORKER_PANICKED);
        }

        let task = &self.task;
        let succeeded = task.status() == TaskStatus::Done;
        let elapsed = task.elapsed();
        self.metrics.record_batch_finished(succeeded, elapsed);

        if succeeded {
            tracing::info!(duration_ms = elapsed.as_millis() as u64, "Batch operation done");
        } else {
            tracing::warn!(duration_ms = elapsed.as_millis() as u64, "Batch operation failed");
        }
    }

    /// Run one engine call, bounded by `engine_call_timeout`.
    async fn call<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.config.engine_call_timeout;
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::from(ExecutionError::TimedOut {
                call,
                after_ms: limit.as_millis() as u64,
            })
        })?
    }

    async fn drive(&self, request: ExecutionRequest) {
        let submitted = self
            .call("submit_execution", self.engine.submit_execution(request))
            .await;
        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Execution engine rejected the run");
                self.task.mark_failed(&e.to_string());
                return;
            }
        };
        self.task.mark_running();
        tracing::debug!(handle = %handle, "Execution started");

        let mut consecutive_failures = 0u32;
        loop {
            match self
                .call("poll_execution", self.engine.poll_execution(&handle))
                .await
            {
                Ok(progress) => {
                    consecutive_failures = 0;
                    self.task.append_log(&progress.log);
                    if progress.done {
                        match progress.failure {
                            Some(reason) => self.task.mark_failed(&reason),
                            None => self.task.mark_done(),
                        };
                        return;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        handle = %handle,
                        error = %e,
                        attempt = consecutive_failures,
                        "Execution poll failed"
                    );
                    if consecutive_failures > self.config.max_poll_failures {
                        self.task
                            .mark_failed(&format!("lost track of execution {}: {}", handle, e));
                        return;
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
