//! Control plane core for a sharded key-value cluster.
//!
//! This crate holds the reconciliation and orchestration logic of the
//! cluster control plane:
//! - **Readiness checks** verify that a replica group covers its shard range
//!   exactly once and agrees with the live registry before it is promoted
//!   to master
//! - **Shard assignment** splits a table's shards into balanced lists for
//!   rebalancing and splitting
//! - **Batch operations** run named actions against a group's nodes through an
//!   external execution engine, one live operation per group
//!
//! Storage, the HTTP layer and the execution engine itself live outside the
//! crate and are reached through the traits in [`topology`] and
//! [`operations`].
//!
//! # Example
//!
//! ```rust,no_run
//! use shardplane::params::CheckGroupReadyToBeMasterParams;
//! use shardplane::testing::{ScriptedEngine, ScriptedRegistry, StaticTopology, StaticWeights};
//! use shardplane::{ControlPlane, ControlPlaneConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plane = ControlPlane::new(
//!         ControlPlaneConfig::default(),
//!         Arc::new(StaticTopology::new(4)),
//!         Arc::new(ScriptedRegistry::new()),
//!         Arc::new(StaticWeights::new()),
//!         Arc::new(ScriptedEngine::new()),
//!     );
//!
//!     let result = plane
//!         .check_group_ready_to_be_master(CheckGroupReadyToBeMasterParams {
//!             group_name: "group-1".to_string(),
//!         })
//!         .await?;
//!     println!("ready: {}", result.ready);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  API layer (external)                    │
//! └──────────────────────────────────────────────────────────┘
//!                            │ params
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ControlPlane                        │
//! └──────────────────────────────────────────────────────────┘
//!          │                  │                    │
//!          ▼                  ▼                    ▼
//! ┌──────────────────┐ ┌───────────────┐ ┌──────────────────────────┐
//! │ ReadinessChecker │ │ ShardAssigner │ │ BatchOperationOrchestrator│
//! └──────────────────┘ └───────────────┘ │   + OperationRegistry     │
//!     │          │             │         └──────────────────────────┘
//!     ▼          ▼             ▼                      │
//! Topology    Registry    WeightSource         ExecutionEngine
//! ```

pub mod assignment;
pub mod config;
pub mod control;
pub mod error;
pub mod metrics;
pub mod operations;
pub mod params;
pub mod readiness;
pub mod testing;
pub mod topology;
pub mod types;

pub use assignment::{AssignMode, ShardAssigner, ShardAssignment, ShardBucket};
pub use config::{AssignerConfig, ControlPlaneConfig, OrchestratorConfig, ReadinessConfig};
pub use control::ControlPlane;
pub use error::{Error, Result};
pub use metrics::{ControlPlaneMetrics, MetricsSnapshot};
pub use operations::{
    BatchOperationOrchestrator, BatchSubmission, ExecutionEngine, OperationRegistry, TaskId,
    TaskSnapshot, TaskStatus,
};
pub use readiness::{ReadinessChecker, ReadinessReport};
pub use topology::{RegistryReader, TopologyReader, WeightSource};
pub use types::{Group, Node, NodeAddress, NodeId, NodeRole, ShardId};
