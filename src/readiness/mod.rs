//! Readiness verification before promoting a group to master.
//!
//! A group may take over the master role for its shard range only if its
//! members' declared leader lists cover every shard exactly once, every member
//! is reachable, and what each member reports through the registry matches
//! what the topology says it should own.
//!
//! # Flow
//!
//! ```text
//!  TopologyReader ──► members + ShardTotal ──► analyze_coverage ──► missing / reduplicative
//!                              │
//!                              ▼
//!               fan-out, one registry query per member
//!               (each bounded by registry_timeout)
//!                              │
//!            ┌─────────────────┴──────────────────┐
//!            ▼                                    ▼
//!      report received                     error / timeout
//!   compare_with_report                 declared leaders ──► unavailable
//!   ──► inconsistent / unavailable
//! ```
//!
//! A registry failure never aborts the check; it is recorded in the verdict
//! and the remaining members are still evaluated.

mod coverage;

pub use coverage::{analyze_coverage, compare_with_report, Coverage, NodeDrift};

use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ReadinessConfig;
use crate::error::Result;
use crate::metrics::ControlPlaneMetrics;
use crate::topology::{RegistryReader, TopologyReader};
use crate::types::{validate_group_name, NodeId, ShardId};

/// Verdict of a readiness check. Computed fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// Group that was checked.
    pub group_name: String,
    /// Shard total the check ran against.
    pub shard_total: u32,
    /// Number of members evaluated.
    pub checked_nodes: usize,
    /// True iff every other field below is empty.
    pub ready: bool,
    /// Shards no member leads.
    pub missing_shards: Vec<ShardId>,
    /// Shards led by more than one member.
    pub reduplicative_shards: Vec<ShardId>,
    /// Per node, shards that cannot be confirmed as serving.
    pub unavailable_shards: BTreeMap<NodeId, Vec<ShardId>>,
    /// Members whose registry report disagrees with the topology.
    pub inconsistent_nodes: Vec<NodeId>,
}

/// Checks whether a group can safely be promoted to master.
///
/// Stateless apart from its collaborators; safe to share and call
/// concurrently.
#[derive(Debug, Clone)]
pub struct ReadinessChecker {
    topology: Arc<dyn TopologyReader>,
    registry: Arc<dyn RegistryReader>,
    config: ReadinessConfig,
    metrics: Arc<ControlPlaneMetrics>,
}

impl ReadinessChecker {
    /// Create a checker.
    pub fn new(
        topology: Arc<dyn TopologyReader>,
        registry: Arc<dyn RegistryReader>,
        config: ReadinessConfig,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            topology,
            registry,
            config,
            metrics,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Run the readiness check for `group_name`.
    ///
    /// Fails only on validation errors or when the topology itself cannot be
    /// read; unreachable members are reported in `unavailable_shards`.
    #[tracing::instrument(skip(self), fields(group = %group_name))]
    pub async fn check(&self, group_name: &str) -> Result<ReadinessReport> {
        validate_group_name(group_name)?;

        let start = Instant::now();
        let (members, shard_total) = tokio::try_join!(
            self.topology.get_group_members(group_name),
            self.topology.get_shard_total(group_name),
        )?;

        let coverage = analyze_coverage(shard_total, &members);

        let mut inconsistent: BTreeSet<NodeId> = coverage.out_of_range.clone();
        let mut unavailable: BTreeMap<NodeId, BTreeSet<ShardId>> = BTreeMap::new();

        if self.config.reject_mixed_roles {
            for node in members.iter().filter(|n| n.has_mixed_roles()) {
                tracing::warn!(
                    node_id = node.node_id,
                    "Node declares both leader and follower shards"
                );
                inconsistent.insert(node.node_id);
            }
        }

        let timeout = self.config.registry_timeout;
        let queries = members.iter().map(|node| {
            let registry = Arc::clone(&self.registry);
            async move {
                let outcome =
                    tokio::time::timeout(timeout, registry.get_node_shard_ownership(&node.address))
                        .await;
                (node, outcome)
            }
        });

        for (node, outcome) in join_all(queries).await {
            match outcome {
                Ok(Ok(report)) => {
                    let drift = compare_with_report(node, &report);
                    if drift.inconsistent {
                        tracing::warn!(
                            node_id = node.node_id,
                            address = %node.address,
                            "Registry ownership differs from declared shards"
                        );
                        inconsistent.insert(node.node_id);
                    }
                    if !drift.unavailable.is_empty() {
                        unavailable
                            .entry(node.node_id)
                            .or_default()
                            .extend(drift.unavailable);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        node_id = node.node_id,
                        address = %node.address,
                        error = %e,
                        "Registry query failed"
                    );
                    self.metrics.registry_unreachable.inc();
                    unavailable
                        .entry(node.node_id)
                        .or_default()
                        .extend(node.leader_set());
                }
                Err(_) => {
                    tracing::warn!(
                        node_id = node.node_id,
                        address = %node.address,
                        timeout_ms = timeout.as_millis() as u64,
                        "Registry query timed out"
                    );
                    self.metrics.registry_unreachable.inc();
                    unavailable
                        .entry(node.node_id)
                        .or_default()
                        .extend(node.leader_set());
                }
            }
        }

        let unavailable_shards: BTreeMap<NodeId, Vec<ShardId>> = unavailable
            .into_iter()
            .map(|(node_id, shards)| (node_id, shards.into_iter().collect()))
            .collect();

        let ready = coverage.missing.is_empty()
            && coverage.reduplicative.is_empty()
            && unavailable_shards.is_empty()
            && inconsistent.is_empty();

        let report = ReadinessReport {
            group_name: group_name.to_string(),
            shard_total,
            checked_nodes: members.len(),
            ready,
            missing_shards: coverage.missing,
            reduplicative_shards: coverage.reduplicative,
            unavailable_shards,
            inconsistent_nodes: inconsistent.into_iter().collect(),
        };

        self.metrics.readiness_checks.inc();
        if !report.ready {
            self.metrics.readiness_not_ready.inc();
        }
        let elapsed = self.metrics.readiness_latency.observe_since(start);

        tracing::info!(
            ready = report.ready,
            shard_total,
            members = report.checked_nodes,
            missing = report.missing_shards.len(),
            reduplicative = report.reduplicative_shards.len(),
            unavailable_nodes = report.unavailable_shards.len(),
            inconsistent = report.inconsistent_nodes.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Readiness check completed"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TopologyError};
    use crate::testing::{ScriptedRegistry, StaticTopology};
    use crate::topology::{NodeShardReport, ReportedShard};
    use crate::types::{Node, NodeAddress};
    use std::time::Duration;

    fn node(id: NodeId, leaders: &[ShardId]) -> Node {
        Node::new(id, "g1", NodeAddress::new(format!("10.0.0.{}", id), 9000))
            .with_leader_shards(leaders.iter().copied())
    }

    fn checker(
        topology: StaticTopology,
        registry: ScriptedRegistry,
        timeout: Duration,
    ) -> ReadinessChecker {
        ReadinessChecker::new(
            Arc::new(topology),
            Arc::new(registry),
            ReadinessConfig::default().with_registry_timeout(timeout),
            Arc::new(ControlPlaneMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_missing_and_reduplicative_shards() {
        let a = node(1, &[0, 1]);
        let b = node(2, &[1, 2]);
        let registry = ScriptedRegistry::new()
            .reply(&a.address, NodeShardReport::leaders([0, 1]))
            .reply(&b.address, NodeShardReport::leaders([1, 2]));
        let topology = StaticTopology::new(4).with_group("g1", vec![a, b]);

        let report = checker(topology, registry, Duration::from_secs(1))
            .check("g1")
            .await
            .unwrap();

        assert!(!report.ready);
        assert_eq!(report.missing_shards, vec![3]);
        assert_eq!(report.reduplicative_shards, vec![1]);
        assert!(report.unavailable_shards.is_empty());
        assert!(report.inconsistent_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_ready_group() {
        let a = node(1, &[0, 1]);
        let b = node(2, &[2, 3]);
        let registry = ScriptedRegistry::new()
            .reply(&a.address, NodeShardReport::leaders([1, 0]))
            .reply(&b.address, NodeShardReport::leaders([2, 3]));
        let topology = StaticTopology::new(4).with_group("g1", vec![a, b]);

        let report = checker(topology, registry, Duration::from_secs(1))
            .check("g1")
            .await
            .unwrap();

        assert!(report.ready);
        assert_eq!(report.checked_nodes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_timeout_marks_shards_unavailable() {
        let a = node(1, &[0, 1]);
        let b = node(2, &[2, 3]);
        let registry = ScriptedRegistry::new()
            .reply(&a.address, NodeShardReport::leaders([0, 1]))
            .hang(&b.address);
        let topology = StaticTopology::new(4).with_group("g1", vec![a, b]);

        let report = checker(topology, registry, Duration::from_millis(200))
            .check("g1")
            .await
            .unwrap();

        assert!(!report.ready);
        assert!(report.missing_shards.is_empty());
        assert!(report.reduplicative_shards.is_empty());
        assert!(report.inconsistent_nodes.is_empty());
        assert_eq!(report.unavailable_shards.len(), 1);
        assert_eq!(report.unavailable_shards[&2], vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_queries_run_concurrently() {
        let members: Vec<Node> = (1..=4)
            .map(|id| node(id, &[id * 2 - 2, id * 2 - 1]))
            .collect();
        let registry = members
            .iter()
            .fold(ScriptedRegistry::new(), |r, n| r.hang(&n.address));
        let calls = registry.clone();
        let topology = StaticTopology::new(8).with_group("g1", members);

        let started = tokio::time::Instant::now();
        let report = checker(topology, registry, Duration::from_millis(200))
            .check("g1")
            .await
            .unwrap();
        let elapsed = started.elapsed();

        // One shared deadline, not one per member.
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(400));
        assert_eq!(calls.calls(), 4);

        assert!(!report.ready);
        assert!(report.missing_shards.is_empty());
        assert_eq!(report.unavailable_shards.len(), 4);
        for id in 1..=4 {
            assert_eq!(report.unavailable_shards[&id], vec![id * 2 - 2, id * 2 - 1]);
        }
    }

    #[tokio::test]
    async fn test_registry_failure_does_not_abort() {
        let a = node(1, &[0]);
        let b = node(2, &[1]);
        let c = node(3, &[2]);
        let registry = ScriptedRegistry::new()
            .fail(&a.address)
            .reply(&b.address, NodeShardReport::leaders([1, 7]))
            .reply(&c.address, NodeShardReport::leaders([2]));
        let topology = StaticTopology::new(3).with_group("g1", vec![a, b, c]);

        let report = checker(topology, registry, Duration::from_secs(1))
            .check("g1")
            .await
            .unwrap();

        assert_eq!(report.unavailable_shards[&1], vec![0]);
        assert_eq!(report.inconsistent_nodes, vec![2]);
        assert!(!report.ready);
    }

    #[tokio::test]
    async fn test_empty_group_is_not_ready() {
        let topology = StaticTopology::new(3).with_group("g1", vec![]);
        let report = checker(topology, ScriptedRegistry::new(), Duration::from_secs(1))
            .check("g1")
            .await
            .unwrap();

        assert!(!report.ready);
        assert_eq!(report.missing_shards, vec![0, 1, 2]);
        assert_eq!(report.checked_nodes, 0);
    }

    #[tokio::test]
    async fn test_mixed_roles_and_reported_unavailability() {
        let a = node(1, &[0]).with_follower_shards([1]);
        let b = node(2, &[1]);
        let registry = ScriptedRegistry::new()
            .reply(
                &a.address,
                NodeShardReport {
                    shards: vec![ReportedShard::leader(0), ReportedShard::follower(1)],
                },
            )
            .reply(
                &b.address,
                NodeShardReport {
                    shards: vec![ReportedShard::leader(1).unavailable()],
                },
            );
        let topology = StaticTopology::new(2).with_group("g1", vec![a, b]);

        let report = checker(topology, registry, Duration::from_secs(1))
            .check("g1")
            .await
            .unwrap();

        assert_eq!(report.inconsistent_nodes, vec![1]);
        assert_eq!(report.unavailable_shards[&2], vec![1]);
        assert!(!report.ready);
    }

    #[tokio::test]
    async fn test_check_is_idempotent() {
        let a = node(1, &[0, 1]);
        let b = node(2, &[1]);
        let registry = ScriptedRegistry::new()
            .reply(&a.address, NodeShardReport::leaders([0]))
            .fail(&b.address);
        let topology = StaticTopology::new(3).with_group("g1", vec![a, b]);
        let checker = checker(topology, registry, Duration::from_secs(1));

        let first = checker.check("g1").await.unwrap();
        let second = checker.check("g1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_group_rejected_before_lookup() {
        let topology = StaticTopology::new(4);
        let observed = topology.clone();
        let err = checker(topology, ScriptedRegistry::new(), Duration::from_secs(1))
            .check("bad group")
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(observed.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let err = checker(
            StaticTopology::new(4),
            ScriptedRegistry::new(),
            Duration::from_secs(1),
        )
        .check("nope")
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::Topology(TopologyError::GroupNotFound(ref g)) if g == "nope"
        ));
    }
}
