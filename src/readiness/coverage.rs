//! Pure shard coverage and drift analysis.
//!
//! Nothing here performs I/O; the checker feeds it topology data and registry
//! reports and assembles the verdict.

use std::collections::{BTreeMap, BTreeSet};

use crate::topology::{NodeShardReport, ShardRole};
use crate::types::{Node, NodeId, ShardId};

/// Leader coverage of `[0, shard_total)` by a set of members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Shards no member leads.
    pub missing: Vec<ShardId>,
    /// Shards led by more than one member.
    pub reduplicative: Vec<ShardId>,
    /// Members that declare a leader shard outside the range.
    pub out_of_range: BTreeSet<NodeId>,
}

/// Count, per shard, how many members declare it as a leader shard.
///
/// A member listing the same id twice counts once. Missing and reduplicative
/// shards are both read from the same count table.
pub fn analyze_coverage(shard_total: u32, members: &[Node]) -> Coverage {
    let mut owners: BTreeMap<ShardId, usize> = (0..shard_total).map(|id| (id, 0)).collect();
    let mut out_of_range = BTreeSet::new();

    for node in members {
        for shard_id in node.leader_set() {
            match owners.get_mut(&shard_id) {
                Some(count) => *count += 1,
                None => {
                    out_of_range.insert(node.node_id);
                }
            }
        }
    }

    let missing = owners
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    let reduplicative = owners
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(&id, _)| id)
        .collect();

    Coverage {
        missing,
        reduplicative,
        out_of_range,
    }
}

/// Differences between what a node declares and what it reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDrift {
    /// Declared and reported shard sets differ.
    pub inconsistent: bool,
    /// Shards the node reports as not serving.
    pub unavailable: Vec<ShardId>,
}

/// Compare a node's declared lists with its registry report.
///
/// Reported leader shards are matched against the declared leader list and
/// reported follower shards against the declared follower list, both as sets.
pub fn compare_with_report(node: &Node, report: &NodeShardReport) -> NodeDrift {
    let reported_leaders: BTreeSet<ShardId> = report.shards_with_role(ShardRole::Leader).collect();
    let reported_followers: BTreeSet<ShardId> =
        report.shards_with_role(ShardRole::Follower).collect();

    let inconsistent =
        reported_leaders != node.leader_set() || reported_followers != node.follower_set();

    let unavailable: BTreeSet<ShardId> = report.unavailable_shards().collect();

    NodeDrift {
        inconsistent,
        unavailable: unavailable.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ReportedShard;
    use crate::types::NodeAddress;

    fn node(id: NodeId, leaders: &[ShardId]) -> Node {
        Node::new(id, "g", NodeAddress::new(format!("10.0.0.{}", id), 9000))
            .with_leader_shards(leaders.iter().copied())
    }

    #[test]
    fn test_missing_and_reduplicative() {
        let members = vec![node(1, &[0, 1]), node(2, &[1, 2])];
        let coverage = analyze_coverage(4, &members);

        assert_eq!(coverage.missing, vec![3]);
        assert_eq!(coverage.reduplicative, vec![1]);
        assert!(coverage.out_of_range.is_empty());
    }

    #[test]
    fn test_no_members_misses_everything() {
        let coverage = analyze_coverage(3, &[]);
        assert_eq!(coverage.missing, vec![0, 1, 2]);
        assert!(coverage.reduplicative.is_empty());
    }

    #[test]
    fn test_duplicate_within_one_node_is_not_reduplicative() {
        let coverage = analyze_coverage(2, &[node(1, &[0, 0, 1])]);
        assert!(coverage.missing.is_empty());
        assert!(coverage.reduplicative.is_empty());
    }

    #[test]
    fn test_out_of_range_flags_node() {
        let coverage = analyze_coverage(2, &[node(1, &[0, 1]), node(2, &[5])]);
        assert!(coverage.missing.is_empty());
        assert!(coverage.reduplicative.is_empty());
        assert_eq!(coverage.out_of_range.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    /// Every shard in range is exactly one of missing, uniquely owned or
    /// reduplicative.
    #[test]
    fn test_coverage_partitions_range() {
        let layouts: Vec<Vec<Vec<ShardId>>> = vec![
            vec![vec![0, 1, 2], vec![2, 3], vec![]],
            vec![vec![5], vec![5], vec![5]],
            vec![vec![0, 2, 4, 6], vec![1, 3, 5, 7], vec![0, 7]],
        ];

        for layout in layouts {
            let members: Vec<Node> = layout
                .iter()
                .enumerate()
                .map(|(i, leaders)| node(i as NodeId, leaders))
                .collect();
            let total = 8;
            let coverage = analyze_coverage(total, &members);

            let covered: BTreeSet<ShardId> =
                members.iter().flat_map(|n| n.leader_set()).collect();
            let missing: BTreeSet<ShardId> = coverage.missing.iter().copied().collect();
            let dup: BTreeSet<ShardId> = coverage.reduplicative.iter().copied().collect();

            assert!(missing.is_disjoint(&covered));
            assert!(dup.is_subset(&covered));
            for id in 0..total {
                assert!(missing.contains(&id) ^ covered.contains(&id));
            }
        }
    }

    #[test]
    fn test_report_matching() {
        let n = node(1, &[0, 1]);

        let same = NodeShardReport::leaders([1, 0]);
        assert_eq!(compare_with_report(&n, &same), NodeDrift::default());

        let drifted = NodeShardReport::leaders([0]);
        assert!(compare_with_report(&n, &drifted).inconsistent);

        let extra_follower = NodeShardReport {
            shards: vec![
                ReportedShard::leader(0),
                ReportedShard::leader(1),
                ReportedShard::follower(4),
            ],
        };
        assert!(compare_with_report(&n, &extra_follower).inconsistent);
    }

    #[test]
    fn test_report_unavailable_shards() {
        let n = node(1, &[0, 1]);
        let report = NodeShardReport {
            shards: vec![ReportedShard::leader(0), ReportedShard::leader(1).unavailable()],
        };
        let drift = compare_with_report(&n, &report);
        assert!(!drift.inconsistent);
        assert_eq!(drift.unavailable, vec![1]);
    }
}
