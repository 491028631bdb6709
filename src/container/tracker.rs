use crate::error::Result;
use crate::seek::{ConsumerSeekCallback, SeekHandle};
use crate::types::*;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AssignmentEntry {
    pub worker: WorkerId,
    pub handle: SeekHandle,
}

/// Which worker owns each assigned partition, and the handle to seek it with.
///
/// At most one entry exists per partition; a missing entry means the
/// partition is not assigned to any worker of this listener.
#[derive(Debug, Default)]
pub struct AssignmentTracker {
    entries: DashMap<TopicPartition, AssignmentEntry>,
}

impl AssignmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, partitions: impl IntoIterator<Item = TopicPartition>, handle: &SeekHandle) {
        for partition in partitions {
            let entry = AssignmentEntry {
                worker: handle.worker().clone(),
                handle: handle.clone(),
            };
            if let Some(previous) = self.entries.insert(partition.clone(), entry) {
                if &previous.worker != handle.worker() {
                    warn!(
                        "Partition {} moved from worker {} to {} without a revocation",
                        partition,
                        previous.worker,
                        handle.worker()
                    );
                }
            }
        }
    }

    /// Remove the entries `worker` holds for `partitions`. Entries already
    /// taken over by another worker are kept.
    pub fn release(&self, worker: &WorkerId, partitions: &[TopicPartition]) -> Vec<TopicPartition> {
        partitions
            .iter()
            .filter(|partition| {
                self.entries
                    .remove_if(*partition, |_, entry| &entry.worker == worker)
                    .is_some()
            })
            .cloned()
            .collect()
    }

    pub fn release_all(&self, worker: &WorkerId) -> Vec<TopicPartition> {
        let partitions = self.partitions_for(worker);
        self.release(worker, &partitions)
    }

    /// Remove the entries for `partitions` whose handle can no longer seek
    /// them. Entries a newer assignment has already rebound are kept.
    pub fn release_revoked(&self, partitions: &[TopicPartition]) -> Vec<TopicPartition> {
        partitions
            .iter()
            .filter(|partition| {
                self.entries
                    .remove_if(*partition, |partition, entry| !entry.handle.is_valid_for(partition))
                    .is_some()
            })
            .cloned()
            .collect()
    }

    pub fn handle_for(&self, partition: &TopicPartition) -> Option<SeekHandle> {
        self.entries
            .get(partition)
            .map(|entry| entry.handle.clone())
    }

    pub fn owner_of(&self, partition: &TopicPartition) -> Option<WorkerId> {
        self.entries
            .get(partition)
            .map(|entry| entry.worker.clone())
    }

    pub fn partitions_for(&self, worker: &WorkerId) -> Vec<TopicPartition> {
        let mut partitions: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| &entry.worker == worker)
            .map(|entry| entry.key().clone())
            .collect();
        partitions.sort();
        partitions
    }

    pub fn assigned_partitions(&self) -> Vec<TopicPartition> {
        let mut partitions: Vec<_> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        partitions.sort();
        partitions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn seek_all_to_beginning(&self) -> Result<()> {
        self.for_each_worker(|handle, partitions| handle.seek_to_beginning_all(partitions))
    }

    pub fn seek_all_to_end(&self) -> Result<()> {
        self.for_each_worker(|handle, partitions| handle.seek_to_end_all(partitions))
    }

    /// Each worker gets one batch, so each resolves the timestamp with a
    /// single lookup.
    pub fn seek_all_to_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        self.for_each_worker(|handle, partitions| handle.seek_to_timestamp_all(partitions, timestamp))
    }

    /// Group partitions by owning worker and call `f` once per worker with
    /// that worker's newest handle. Every worker is attempted; the first
    /// error is returned.
    fn for_each_worker<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&SeekHandle, &[TopicPartition]) -> Result<()>,
    {
        let mut groups: BTreeMap<WorkerId, (SeekHandle, Vec<TopicPartition>)> = BTreeMap::new();
        for entry in self.entries.iter() {
            let group = groups
                .entry(entry.worker.clone())
                .or_insert_with(|| (entry.handle.clone(), Vec::new()));
            if entry.handle.generation() > group.0.generation() {
                group.0 = entry.handle.clone();
            }
            group.1.push(entry.key().clone());
        }

        let mut first_error = None;
        for (_, (handle, mut partitions)) in groups {
            partitions.sort();
            if let Err(e) = f(&handle, &partitions) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SeekMetrics;
    use crate::seek::SeekState;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn tp(partition: u32) -> TopicPartition {
        TopicPartition::new("orders", partition)
    }

    fn worker_state(name: &str) -> Arc<SeekState> {
        let metrics = Arc::new(SeekMetrics::new().unwrap());
        Arc::new(SeekState::new(WorkerId::new(name), 100, metrics))
    }

    #[test]
    fn test_bind_and_release() {
        let tracker = AssignmentTracker::new();
        let a = worker_state("a");
        let b = worker_state("b");
        a.assign([tp(0), tp(1)]);
        b.assign([tp(2)]);
        tracker.bind([tp(0), tp(1)], &a.handle());
        tracker.bind([tp(2)], &b.handle());

        assert_eq!(tracker.assigned_partitions(), vec![tp(0), tp(1), tp(2)]);
        assert_eq!(tracker.owner_of(&tp(2)), Some(WorkerId::new("b")));
        assert_eq!(tracker.partitions_for(&WorkerId::new("a")), vec![tp(0), tp(1)]);

        // Worker a cannot release a partition that belongs to b.
        let released = tracker.release(&WorkerId::new("a"), &[tp(1), tp(2)]);
        assert_eq!(released, vec![tp(1)]);
        assert!(tracker.handle_for(&tp(1)).is_none());
        assert!(tracker.handle_for(&tp(2)).is_some());

        assert_eq!(tracker.release_all(&WorkerId::new("b")), vec![tp(2)]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_release_revoked_keeps_rebound_partition() {
        let tracker = AssignmentTracker::new();
        let a = worker_state("a");
        let b = worker_state("b");
        a.assign([tp(0), tp(1)]);
        tracker.bind([tp(0), tp(1)], &a.handle());

        // b picks up partition 1 before a's revocation is reported.
        b.assign([tp(1)]);
        tracker.bind([tp(1)], &b.handle());
        a.revoke(&[tp(0), tp(1)]);

        let released = tracker.release_revoked(&[tp(0), tp(1)]);
        assert_eq!(released, vec![tp(0)]);
        assert_eq!(tracker.owner_of(&tp(1)), Some(WorkerId::new("b")));
        assert_eq!(tracker.assigned_partitions(), vec![tp(1)]);
    }

    #[test]
    fn test_seek_all_groups_by_worker() {
        let tracker = AssignmentTracker::new();
        let a = worker_state("a");
        let b = worker_state("b");
        a.assign([tp(0), tp(1)]);
        b.assign([tp(2)]);
        tracker.bind([tp(0), tp(1)], &a.handle());
        tracker.bind([tp(2)], &b.handle());

        tracker.seek_all_to_timestamp(1_000).unwrap();

        let batch_a = a.drain_pending();
        assert_eq!(batch_a.timestamps().len(), 2);
        let batch_b = b.drain_pending();
        assert_eq!(batch_b.timestamps().len(), 1);
    }
}
