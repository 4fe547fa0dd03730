//! Balanced shard list assignment.
//!
//! Splits a table's shards into `AssignedListNum` lists of roughly equal
//! weight so that each list can be moved or split off as a unit. Weights are
//! fetched from the [`WeightSource`]; the balancing itself is pure and
//! deterministic.

mod balance;

pub use balance::balance;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AssignerConfig;
use crate::error::{Result, ValidationError};
use crate::metrics::ControlPlaneMetrics;
use crate::topology::{ShardMetrics, WeightSource};
use crate::types::ShardId;

/// What a shard weighs when balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignMode {
    /// On-disk size.
    ByShardSize,
    /// Combined read and write rate.
    ByShardKps,
    /// Every shard weighs the same.
    ByShardNum,
}

impl AssignMode {
    /// Wire code of the mode.
    pub fn code(&self) -> u32 {
        match self {
            AssignMode::ByShardSize => 1,
            AssignMode::ByShardKps => 2,
            AssignMode::ByShardNum => 3,
        }
    }

    /// Weight of a shard with the given metrics.
    pub fn weight_of(&self, metrics: &ShardMetrics) -> u64 {
        match self {
            AssignMode::ByShardSize => metrics.size_bytes,
            AssignMode::ByShardKps => metrics.kps(),
            AssignMode::ByShardNum => 1,
        }
    }
}

impl TryFrom<u32> for AssignMode {
    type Error = ValidationError;

    fn try_from(code: u32) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(AssignMode::ByShardSize),
            2 => Ok(AssignMode::ByShardKps),
            3 => Ok(AssignMode::ByShardNum),
            other => Err(ValidationError::UnknownAssignMode(other)),
        }
    }
}

/// One list of shards with its summed metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardBucket {
    pub shards: Vec<ShardId>,
    pub size_sum: u64,
    pub kps_sum: u64,
}

impl ShardBucket {
    fn from_shards(shards: Vec<ShardId>, metrics: &HashMap<ShardId, ShardMetrics>) -> Self {
        let (size_sum, kps_sum) = shards
            .iter()
            .filter_map(|id| metrics.get(id))
            .fold((0u64, 0u64), |(size, kps), m| {
                (size.saturating_add(m.size_bytes), kps.saturating_add(m.kps()))
            });
        Self {
            shards,
            size_sum,
            kps_sum,
        }
    }
}

/// Result of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardAssignment {
    /// The whole table: every shard, sorted, with grand totals.
    pub total: ShardBucket,
    /// Exactly the requested number of buckets, in bucket order.
    pub buckets: Vec<ShardBucket>,
}

/// Computes balanced shard lists for a table.
#[derive(Debug, Clone)]
pub struct ShardAssigner {
    weights: Arc<dyn WeightSource>,
    config: AssignerConfig,
    metrics: Arc<ControlPlaneMetrics>,
}

impl ShardAssigner {
    /// Create an assigner.
    pub fn new(
        weights: Arc<dyn WeightSource>,
        config: AssignerConfig,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            weights,
            config,
            metrics,
        }
    }

    /// Check the request without touching the weight source.
    pub fn validate(
        &self,
        database: &str,
        table: &str,
        list_num: u32,
    ) -> std::result::Result<(), ValidationError> {
        if database.is_empty() || table.is_empty() {
            return Err(ValidationError::EmptyTableName);
        }
        if list_num == 0 {
            return Err(ValidationError::ZeroListNum);
        }
        if list_num > self.config.max_list_num {
            return Err(ValidationError::ListNumTooLarge {
                requested: list_num,
                max: self.config.max_list_num,
            });
        }
        Ok(())
    }

    /// Split the table's shards into `list_num` balanced lists.
    pub async fn assign(
        &self,
        database: &str,
        table: &str,
        mode: AssignMode,
        list_num: u32,
    ) -> Result<ShardAssignment> {
        if let Err(e) = self.validate(database, table, list_num) {
            self.metrics.assignments_rejected.inc();
            tracing::warn!(database, table, list_num, error = %e, "Rejected shard assignment");
            return Err(e.into());
        }

        let mut shards = self.weights.get_table_shards(database, table).await?;
        shards.sort_unstable();
        shards.dedup();

        let metrics = self.weights.get_shard_metrics(database, table).await?;

        let weighted: Vec<(ShardId, u64)> = shards
            .iter()
            .map(|id| {
                let m = metrics.get(id).copied().unwrap_or_default();
                (*id, mode.weight_of(&m))
            })
            .collect();

        let buckets: Vec<ShardBucket> = balance(&weighted, list_num as usize)
            .into_iter()
            .map(|b| ShardBucket::from_shards(b, &metrics))
            .collect();
        let total = ShardBucket::from_shards(shards, &metrics);

        self.metrics.assignments.inc();
        tracing::info!(
            database,
            table,
            mode = ?mode,
            shards = total.shards.len(),
            lists = buckets.len(),
            "Computed shard assignment"
        );
        for (idx, bucket) in buckets.iter().enumerate() {
            tracing::debug!(
                list = idx,
                shards = bucket.shards.len(),
                size_sum = bucket.size_sum,
                kps_sum = bucket.kps_sum,
                "Assigned shard list"
            );
        }

        Ok(ShardAssignment { total, buckets })
    }
}
