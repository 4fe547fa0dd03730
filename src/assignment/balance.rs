//! Greedy longest-processing-time bucket balancing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::ShardId;

/// Split weighted shards into exactly `bucket_count` buckets.
///
/// Shards are placed heaviest first (ties by ascending id), each into the
/// bucket with the lowest running total (ties by lowest bucket index).
/// Bucket contents are returned sorted ascending. With more buckets than
/// shards the trailing buckets stay empty.
///
/// The heaviest bucket ends up at most one shard weight above the optimum.
pub fn balance(weights: &[(ShardId, u64)], bucket_count: usize) -> Vec<Vec<ShardId>> {
    let mut buckets: Vec<Vec<ShardId>> = vec![Vec::new(); bucket_count];
    if bucket_count == 0 {
        return buckets;
    }

    let mut order: Vec<(ShardId, u64)> = weights.to_vec();
    order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    // Min-heap on (running total, bucket index).
    let mut lightest: BinaryHeap<Reverse<(u128, usize)>> =
        (0..bucket_count).map(|idx| Reverse((0, idx))).collect();

    for (shard_id, weight) in order {
        if let Some(Reverse((total, idx))) = lightest.pop() {
            buckets[idx].push(shard_id);
            lightest.push(Reverse((total + weight as u128, idx)));
        }
    }

    for bucket in &mut buckets {
        bucket.sort_unstable();
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn equal(n: u32) -> Vec<(ShardId, u64)> {
        (0..n).map(|id| (id, 1)).collect()
    }

    #[test]
    fn test_equal_weights_split_by_id() {
        let buckets = balance(&equal(5), 2);
        assert_eq!(buckets, vec![vec![0, 2, 4], vec![1, 3]]);
    }

    #[test]
    fn test_heaviest_first() {
        let weights = vec![(0, 10), (1, 1), (2, 1), (3, 7), (4, 3)];
        let buckets = balance(&weights, 2);

        // 0 -> b0 (10), 3 -> b1 (7), 4 -> b1 (10), 1 -> b0 (11), 2 -> b1 (11)
        assert_eq!(buckets, vec![vec![0, 1], vec![2, 3, 4]]);
    }

    #[test]
    fn test_more_buckets_than_shards() {
        let buckets = balance(&equal(2), 4);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0], vec![0]);
        assert_eq!(buckets[1], vec![1]);
        assert!(buckets[2].is_empty());
        assert!(buckets[3].is_empty());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = vec![(3, 5), (1, 5), (2, 9), (0, 1)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(balance(&a, 3), balance(&b, 3));
    }

    #[test]
    fn test_partition_and_bound() {
        let weights: Vec<(ShardId, u64)> =
            (0..37).map(|id| (id, (id as u64 * 7919) % 101)).collect();
        let max_weight = weights.iter().map(|w| w.1).max().unwrap_or(0);
        let total: u64 = weights.iter().map(|w| w.1).sum();

        for n in 1..=8 {
            let buckets = balance(&weights, n);
            assert_eq!(buckets.len(), n);

            let all: Vec<ShardId> = buckets.iter().flatten().copied().collect();
            let unique: BTreeSet<ShardId> = all.iter().copied().collect();
            assert_eq!(all.len(), weights.len());
            assert_eq!(unique.len(), weights.len());

            let lookup = |id: ShardId| weights[id as usize].1;
            let heaviest = buckets
                .iter()
                .map(|b| b.iter().map(|&id| lookup(id)).sum::<u64>())
                .max()
                .unwrap_or(0);
            // The optimum is at least the average bucket weight.
            let lower_bound = (total + n as u64 - 1) / n as u64;
            assert!(heaviest <= lower_bound + max_weight);
        }
    }
}
