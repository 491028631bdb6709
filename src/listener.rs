use crate::container::AssignmentTracker;
use crate::error::Result;
use crate::seek::{ScopedSeekCallback, SeekHandle};
use crate::types::*;
use dashmap::DashMap;
use std::collections::HashMap;

/// Hooks a listener implements to take part in seek coordination.
///
/// Every method has a no-op default so a listener only implements what it
/// needs. All hooks run on the polling worker that triggered them.
pub trait ConsumerSeekAware: Send + Sync {
    /// A worker started or received a new assignment; `callback` stays usable
    /// from any thread until its partitions are revoked.
    fn register_seek_callback(&self, _callback: SeekHandle) {}

    /// Seeks made through `callback` are applied before the first poll of the
    /// new assignment. `assignments` maps each partition to its starting
    /// offset.
    fn on_partitions_assigned(
        &self,
        _assignments: &HashMap<TopicPartition, Offset>,
        _callback: &ScopedSeekCallback,
    ) {
    }

    fn on_partitions_revoked(&self, _partitions: &[TopicPartition]) {}

    /// The container saw no records for the idle interval. `assignments` maps
    /// each partition of the worker to its current position.
    fn on_idle_container(
        &self,
        _assignments: &HashMap<TopicPartition, Offset>,
        _callback: &ScopedSeekCallback,
    ) {
    }

    /// The worker is stopping.
    fn unregister_seek_callback(&self, _worker: &WorkerId) {}
}

/// Listener that never seeks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSeekAware;

impl ConsumerSeekAware for NoopSeekAware {}

/// Seek handles collected by a listener from its own hooks.
///
/// Embed one in a listener and forward the hooks to it; the listener can
/// then reposition everything it currently owns from any thread.
#[derive(Debug, Default)]
pub struct SeekCallbacks {
    assignments: AssignmentTracker,
    registered: DashMap<WorkerId, SeekHandle>,
}

impl SeekCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: SeekHandle) {
        self.registered.insert(callback.worker().clone(), callback);
    }

    pub fn on_assigned(
        &self,
        assignments: &HashMap<TopicPartition, Offset>,
        callback: &ScopedSeekCallback,
    ) {
        self.assignments
            .bind(assignments.keys().cloned(), &callback.handle());
    }

    /// Drop the revoked partitions, unless another worker's assignment
    /// already took them over.
    pub fn on_revoked(&self, partitions: &[TopicPartition]) {
        self.assignments.release_revoked(partitions);
    }

    pub fn unregister(&self, worker: &WorkerId) {
        self.registered.remove(worker);
        self.assignments.release_all(worker);
    }

    pub fn callback_for(&self, partition: &TopicPartition) -> Option<SeekHandle> {
        self.assignments.handle_for(partition)
    }

    /// Handle registered by `worker`, if it is running.
    pub fn worker_callback(&self, worker: &WorkerId) -> Option<SeekHandle> {
        self.registered.get(worker).map(|entry| entry.value().clone())
    }

    pub fn assigned_partitions(&self) -> Vec<TopicPartition> {
        self.assignments.assigned_partitions()
    }

    pub fn seek_to_beginning(&self) -> Result<()> {
        self.assignments.seek_all_to_beginning()
    }

    pub fn seek_to_end(&self) -> Result<()> {
        self.assignments.seek_all_to_end()
    }

    pub fn seek_to_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        self.assignments.seek_all_to_timestamp(timestamp)
    }
}
