//! Per-group table of batch tasks.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::task::{BatchTask, TaskSnapshot};
use crate::error::{Error, Result};

/// Latest batch task of every group.
///
/// A group holds at most one live task. Finished tasks stay in their slot so
/// they can still be polled, until the next submission for the group
/// replaces them.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    tasks: DashMap<String, Arc<BatchTask>>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `task` as the group's current task unless a live one exists.
    ///
    /// The check and the insert happen under the same slot lock, so of
    /// several concurrent claims for one group exactly one succeeds.
    pub fn claim(&self, task: BatchTask) -> Result<Arc<BatchTask>> {
        match self.tasks.entry(task.group_name().to_string()) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if !current.is_terminal() {
                    return Err(Error::Conflict {
                        group: current.group_name().to_string(),
                        task_id: current.task_id().to_string(),
                    });
                }
                let task = Arc::new(task);
                slot.insert(Arc::clone(&task));
                Ok(task)
            }
            Entry::Vacant(slot) => {
                let task = Arc::new(task);
                slot.insert(Arc::clone(&task));
                Ok(task)
            }
        }
    }

    /// The group's current task.
    pub fn get(&self, group_name: &str) -> Option<Arc<BatchTask>> {
        self.tasks.get(group_name).map(|t| Arc::clone(t.value()))
    }

    /// Snapshot of the group's current task.
    pub fn snapshot(&self, group_name: &str) -> Option<TaskSnapshot> {
        self.get(group_name).map(|t| t.snapshot())
    }

    /// Snapshots of every group's current task, ordered by group name.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<TaskSnapshot> = self.tasks.iter().map(|t| t.value().snapshot()).collect();
        all.sort_by(|a, b| a.group_name.cmp(&b.group_name));
        all
    }

    /// Number of tasks that have not finished.
    pub fn live_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.value().is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn task(group: &str) -> BatchTask {
        BatchTask::new(group, "restart", "restart", vec![], vec![], 1024)
    }

    #[test]
    fn test_claim_conflicts_while_live() {
        let registry = OperationRegistry::new();
        let first = registry.claim(task("g1")).unwrap();

        let err = registry.claim(task("g1")).unwrap_err();
        assert!(err.is_conflict());

        // Other groups are unaffected.
        registry.claim(task("g2")).unwrap();
        assert_eq!(registry.live_count(), 2);

        first.mark_failed("boom");
        let second = registry.claim(task("g1")).unwrap();
        assert_ne!(first.task_id(), second.task_id());
        assert_eq!(registry.get("g1").unwrap().task_id(), second.task_id());
    }

    #[test]
    fn test_finished_task_stays_visible() {
        let registry = OperationRegistry::new();
        let t = registry.claim(task("g1")).unwrap();
        t.mark_running();
        t.mark_done();

        let snap = registry.snapshot("g1").unwrap();
        assert!(snap.done());
        assert_eq!(registry.live_count(), 0);
        assert!(registry.snapshot("g2").is_none());
    }

    #[test]
    fn test_tasks_sorted_by_group() {
        let registry = OperationRegistry::new();
        for group in ["g3", "g1", "g2"] {
            registry.claim(task(group)).unwrap();
        }
        let groups: Vec<String> = registry.tasks().into_iter().map(|t| t.group_name).collect();
        assert_eq!(groups, vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let registry = Arc::new(OperationRegistry::new());
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.claim(task("g1")).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
