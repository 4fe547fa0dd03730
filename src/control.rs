//! The control plane facade.
//!
//! Wires the readiness checker, shard assigner and batch orchestrator to their
//! collaborators and exposes the operations over the wire types in
//! [`crate::params`].

use std::sync::Arc;

use crate::assignment::{AssignMode, ShardAssigner};
use crate::config::ControlPlaneConfig;
use crate::error::Result;
use crate::metrics::{ControlPlaneMetrics, MetricsSnapshot};
use crate::operations::{BatchOperationOrchestrator, ExecutionEngine, OperationRegistry};
use crate::params::{
    AssignShardListParams, AssignedTableShardResult, CheckGroupReadyToBeMasterParams,
    CheckGroupReadyToBeMasterResult, NodeBatchOperationInfo, NodeBatchOperationInfoParams,
    NodeBatchOperationParams, NodeBatchOperationResult,
};
use crate::readiness::{ReadinessChecker, ReadinessReport};
use crate::topology::{RegistryReader, TopologyReader, WeightSource};

/// Entry point of the control plane core.
///
/// Cheap to clone; clones share the task registry and metrics.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    readiness: ReadinessChecker,
    assigner: ShardAssigner,
    orchestrator: BatchOperationOrchestrator,
    metrics: Arc<ControlPlaneMetrics>,
}

impl ControlPlane {
    /// Build the control plane over its collaborators.
    pub fn new(
        config: ControlPlaneConfig,
        topology: Arc<dyn TopologyReader>,
        registry: Arc<dyn RegistryReader>,
        weights: Arc<dyn WeightSource>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        let metrics = Arc::new(ControlPlaneMetrics::new());
        let operations = Arc::new(OperationRegistry::new());

        Self {
            readiness: ReadinessChecker::new(
                topology,
                registry,
                config.readiness,
                Arc::clone(&metrics),
            ),
            assigner: ShardAssigner::new(weights, config.assigner, Arc::clone(&metrics)),
            orchestrator: BatchOperationOrchestrator::new(
                operations,
                engine,
                config.orchestrator,
                Arc::clone(&metrics),
            ),
            metrics,
        }
    }

    pub fn readiness(&self) -> &ReadinessChecker {
        &self.readiness
    }

    pub fn assigner(&self) -> &ShardAssigner {
        &self.assigner
    }

    pub fn orchestrator(&self) -> &BatchOperationOrchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Full readiness report for a group.
    pub async fn readiness_report(&self, group_name: &str) -> Result<ReadinessReport> {
        self.readiness.check(group_name).await
    }

    /// Whether a group may take over the master role.
    pub async fn check_group_ready_to_be_master(
        &self,
        params: CheckGroupReadyToBeMasterParams,
    ) -> Result<CheckGroupReadyToBeMasterResult> {
        Ok(self.readiness.check(&params.group_name).await?.into())
    }

    /// Split a table's shards into balanced lists.
    pub async fn assign_shard_list(
        &self,
        params: AssignShardListParams,
    ) -> Result<AssignedTableShardResult> {
        let mode = match AssignMode::try_from(params.assign_type) {
            Ok(mode) => mode,
            Err(e) => {
                self.metrics.assignments_rejected.inc();
                tracing::warn!(assign_type = params.assign_type, "Unknown assignment type");
                return Err(e.into());
            }
        };

        let assignment = self
            .assigner
            .assign(
                &params.database_name,
                &params.table_name,
                mode,
                params.assigned_list_num,
            )
            .await?;
        Ok(assignment.into())
    }

    /// Start a batch operation. Returns as soon as the task is registered.
    pub fn submit_batch_operation(
        &self,
        params: NodeBatchOperationParams,
    ) -> Result<NodeBatchOperationResult> {
        let task_id = self.orchestrator.submit(params.into())?;
        Ok(task_id.into())
    }

    /// Progress of a group's current batch operation.
    pub fn poll_batch_operation(
        &self,
        params: NodeBatchOperationInfoParams,
    ) -> Result<NodeBatchOperationInfo> {
        Ok(self.orchestrator.poll(&params.group_name)?.into())
    }
}
