//! Read-side collaborators of the control plane.
//!
//! Three external sources feed the core:
//!
//! - [`TopologyReader`]: the intended state (group membership, declared
//!   shard lists, shard totals).
//! - [`RegistryReader`]: what each node reports it actually owns, used to
//!   detect drift from the intended state.
//! - [`WeightSource`]: per-shard cost signals used for balancing.
//!
//! All of them are read-only from the core's point of view and may be called
//! concurrently.

mod shard_list;

pub use shard_list::{format_shard_list, parse_shard_list};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Node, NodeAddress, ShardId};

/// Intended cluster state.
#[async_trait]
pub trait TopologyReader: Send + Sync + std::fmt::Debug {
    /// Members of a group with their declared shard lists.
    async fn get_group_members(&self, group_name: &str) -> Result<Vec<Node>>;

    /// Number of shards the group's tables are split into.
    async fn get_shard_total(&self, group_name: &str) -> Result<u32>;
}

/// Role a node reports for a shard it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardRole {
    Leader,
    Follower,
}

/// Serving state a node reports for a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardServiceState {
    Available,
    Unavailable,
}

/// One shard entry in a node's self-report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedShard {
    pub shard_id: ShardId,
    pub role: ShardRole,
    pub service_state: ShardServiceState,
}

impl ReportedShard {
    /// An available leader shard.
    pub fn leader(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            role: ShardRole::Leader,
            service_state: ShardServiceState::Available,
        }
    }

    /// An available follower shard.
    pub fn follower(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            role: ShardRole::Follower,
            service_state: ShardServiceState::Available,
        }
    }

    /// Mark the shard as not serving.
    pub fn unavailable(mut self) -> Self {
        self.service_state = ShardServiceState::Unavailable;
        self
    }

    /// Whether the shard is serving.
    pub fn is_available(&self) -> bool {
        self.service_state == ShardServiceState::Available
    }
}

/// Live shard ownership as reported by a node through the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeShardReport {
    pub shards: Vec<ReportedShard>,
}

impl NodeShardReport {
    /// A report in which every listed shard is an available leader.
    pub fn leaders(shards: impl IntoIterator<Item = ShardId>) -> Self {
        Self {
            shards: shards.into_iter().map(ReportedShard::leader).collect(),
        }
    }

    /// Shard ids reported with `role`.
    pub fn shards_with_role(&self, role: ShardRole) -> impl Iterator<Item = ShardId> + '_ {
        self.shards
            .iter()
            .filter(move |s| s.role == role)
            .map(|s| s.shard_id)
    }

    /// Shard ids reported as not serving.
    pub fn unavailable_shards(&self) -> impl Iterator<Item = ShardId> + '_ {
        self.shards
            .iter()
            .filter(|s| !s.is_available())
            .map(|s| s.shard_id)
    }
}

/// Live, node-reported ownership.
///
/// An `Err` means the node could not be reached; the readiness check turns
/// that into data rather than failing.
#[async_trait]
pub trait RegistryReader: Send + Sync + std::fmt::Debug {
    /// Shards the node at `address` currently reports.
    async fn get_node_shard_ownership(&self, address: &NodeAddress) -> Result<NodeShardReport>;
}

/// Per-shard cost signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardMetrics {
    /// On-disk size in bytes.
    pub size_bytes: u64,
    /// Reads per second (thousands).
    pub read_kps: u64,
    /// Writes per second (thousands).
    pub write_kps: u64,
}

impl ShardMetrics {
    /// Combined read and write rate.
    pub fn kps(&self) -> u64 {
        self.read_kps.saturating_add(self.write_kps)
    }
}

/// Source of shard cost signals.
#[async_trait]
pub trait WeightSource: Send + Sync + std::fmt::Debug {
    /// All shard ids of the table.
    async fn get_table_shards(&self, database: &str, table: &str) -> Result<Vec<ShardId>>;

    /// Metrics for the table's shards. Shards may be absent, in which case
    /// they weigh 0 in size and rate based modes.
    async fn get_shard_metrics(
        &self,
        database: &str,
        table: &str,
    ) -> Result<HashMap<ShardId, ShardMetrics>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_role_filters() {
        let report = NodeShardReport {
            shards: vec![
                ReportedShard::leader(0),
                ReportedShard::follower(1),
                ReportedShard::leader(2).unavailable(),
            ],
        };

        assert_eq!(
            report.shards_with_role(ShardRole::Leader).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(
            report.shards_with_role(ShardRole::Follower).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(report.unavailable_shards().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_kps_saturates() {
        let m = ShardMetrics {
            size_bytes: 0,
            read_kps: u64::MAX,
            write_kps: 1,
        };
        assert_eq!(m.kps(), u64::MAX);
    }
}
