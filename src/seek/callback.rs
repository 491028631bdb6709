use crate::error::{Result, SeekError};
use crate::metrics::SeekMetrics;
use crate::seek::batcher::{PendingSeeks, SeekBatch};
use crate::types::*;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Cursor operations offered to listener code.
///
/// Implementations only decide where a request goes via [`submit`]; the
/// convenience forms all build on it.
///
/// [`submit`]: ConsumerSeekCallback::submit
pub trait ConsumerSeekCallback: Send + Sync {
    fn submit(&self, operations: Vec<SeekOperation>) -> Result<()>;

    fn seek(&self, partition: &TopicPartition, offset: Offset) -> Result<()> {
        self.submit(vec![SeekOperation::new(
            partition.clone(),
            SeekRequest::ToOffset(offset),
        )])
    }

    fn seek_to_beginning(&self, partition: &TopicPartition) -> Result<()> {
        self.seek_to_beginning_all(slice_of(partition))
    }

    /// One broker call per partition; no lookup involved.
    fn seek_to_beginning_all(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.submit(requests(partitions, SeekRequest::ToBeginning))
    }

    fn seek_to_end(&self, partition: &TopicPartition) -> Result<()> {
        self.seek_to_end_all(slice_of(partition))
    }

    fn seek_to_end_all(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.submit(requests(partitions, SeekRequest::ToEnd))
    }

    /// See [`SeekRequest::Relative`] for how `delta` and `to_current` combine.
    fn seek_relative(&self, partition: &TopicPartition, delta: i64, to_current: bool) -> Result<()> {
        self.submit(vec![SeekOperation::new(
            partition.clone(),
            SeekRequest::Relative { delta, to_current },
        )])
    }

    fn seek_to_timestamp(&self, partition: &TopicPartition, timestamp: Timestamp) -> Result<()> {
        self.seek_to_timestamp_all(slice_of(partition), timestamp)
    }

    /// Resolved with a single lookup for all partitions.
    fn seek_to_timestamp_all(&self, partitions: &[TopicPartition], timestamp: Timestamp) -> Result<()> {
        self.submit(requests(partitions, SeekRequest::ToTimestamp(timestamp)))
    }
}

fn slice_of(partition: &TopicPartition) -> &[TopicPartition] {
    std::slice::from_ref(partition)
}

fn requests(partitions: &[TopicPartition], request: SeekRequest) -> Vec<SeekOperation> {
    partitions
        .iter()
        .map(|partition| SeekOperation::new(partition.clone(), request))
        .collect()
}

/// Which partitions a worker owns, and which it owned before.
#[derive(Debug, Default)]
struct Ownership {
    /// Owned partitions and the generation in which each was assigned.
    assigned: HashMap<TopicPartition, u64>,
    /// Most recent ownership span `(assigned_in, revoked_in)` of each
    /// partition the worker gave up.
    released: HashMap<TopicPartition, (u64, u64)>,
}

impl Ownership {
    fn permits(&self, partition: &TopicPartition, generation: u64) -> bool {
        matches!(self.assigned.get(partition), Some(&assigned_in) if assigned_in <= generation)
    }

    /// Whether a handle of `generation` could once seek `partition`.
    fn held_at(&self, partition: &TopicPartition, generation: u64) -> bool {
        matches!(
            self.released.get(partition),
            Some(&(assigned_in, revoked_in)) if assigned_in <= generation && generation <= revoked_in
        )
    }
}

/// Per-worker seek bookkeeping shared between the worker and its handles.
pub(crate) struct SeekState {
    worker: WorkerId,
    /// Bumped on every revocation this worker sees.
    generation: AtomicU64,
    owned: RwLock<Ownership>,
    pending: PendingSeeks,
    metrics: Arc<SeekMetrics>,
}

impl SeekState {
    pub(crate) fn new(worker: WorkerId, max_pending: usize, metrics: Arc<SeekMetrics>) -> Self {
        Self {
            worker,
            generation: AtomicU64::new(0),
            owned: RwLock::new(Ownership::default()),
            pending: PendingSeeks::new(max_pending),
            metrics,
        }
    }

    pub(crate) fn handle(self: &Arc<Self>) -> SeekHandle {
        SeekHandle {
            state: self.clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn assign(&self, partitions: impl IntoIterator<Item = TopicPartition>) {
        let generation = self.generation.load(Ordering::SeqCst);
        let mut owned = self.owned.write();
        for partition in partitions {
            owned.assigned.entry(partition).or_insert(generation);
        }
    }

    /// Forget `partitions` and drop anything still queued for them. Returns
    /// the number of dropped requests.
    pub(crate) fn revoke(&self, partitions: &[TopicPartition]) -> usize {
        let mut owned = self.owned.write();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        for partition in partitions {
            if let Some(assigned_in) = owned.assigned.remove(partition) {
                owned
                    .released
                    .insert(partition.clone(), (assigned_in, generation));
            }
        }
        self.pending.discard(partitions)
    }

    pub(crate) fn owns(&self, partition: &TopicPartition) -> bool {
        self.owned.read().assigned.contains_key(partition)
    }

    pub(crate) fn owned_partitions(&self) -> Vec<TopicPartition> {
        let mut partitions: Vec<_> = self.owned.read().assigned.keys().cloned().collect();
        partitions.sort();
        partitions
    }

    /// Drain deferred requests, keeping only those for partitions still owned.
    pub(crate) fn drain_pending(&self) -> SeekBatch {
        let owned = self.owned.read();
        let mut batch = self.pending.drain();
        let dropped = batch.retain(|partition| owned.assigned.contains_key(partition));
        if dropped > 0 {
            warn!(
                "Dropped {} queued seek(s) on worker {} for partitions it no longer owns",
                dropped, self.worker
            );
            self.metrics.record_unassigned(dropped as u64);
        }
        batch
    }

    pub(crate) fn pending(&self) -> &PendingSeeks {
        &self.pending
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &SeekMetrics {
        &self.metrics
    }

    /// Check that a handle issued in `handle_generation` may still seek
    /// `partition`.
    fn check(
        &self,
        owned: &Ownership,
        handle_generation: u64,
        partition: &TopicPartition,
    ) -> Result<()> {
        if owned.permits(partition, handle_generation) {
            Ok(())
        } else if owned.held_at(partition, handle_generation) {
            Err(self.stale(partition))
        } else {
            Err(self.unassigned(partition))
        }
    }

    fn stale(&self, partition: &TopicPartition) -> SeekError {
        warn!(
            "Ignoring seek on {} through a stale handle of worker {}",
            partition, self.worker
        );
        self.metrics.record_stale(1);
        SeekError::StaleHandle {
            worker: self.worker.clone(),
            partition: partition.clone(),
        }
    }

    fn unassigned(&self, partition: &TopicPartition) -> SeekError {
        warn!(
            "Ignoring seek on {}: not assigned to worker {}",
            partition, self.worker
        );
        self.metrics.record_unassigned(1);
        SeekError::UnassignedPartition {
            worker: self.worker.clone(),
            partition: partition.clone(),
        }
    }

    /// Split `operations` into those allowed for `handle_generation` and the
    /// first rejection, if any.
    fn admit(
        &self,
        owned: &Ownership,
        handle_generation: u64,
        operations: Vec<SeekOperation>,
    ) -> (Vec<SeekOperation>, Option<SeekError>) {
        let mut admitted = Vec::with_capacity(operations.len());
        let mut rejection = None;
        for operation in operations {
            match self.check(owned, handle_generation, &operation.partition) {
                Ok(()) => admitted.push(operation),
                Err(e) => {
                    rejection.get_or_insert(e);
                }
            }
        }
        (admitted, rejection)
    }
}

/// Durable seek handle for one polling worker.
///
/// Cloneable and usable from any thread. Requests are queued and applied by
/// the worker before its next poll. A handle stops working for a partition
/// once that partition is revoked from its worker, even if the partition
/// comes back later; requests through it are then dropped with
/// [`SeekError::StaleHandle`].
///
/// For a batch, requests on partitions the handle may still seek are queued
/// even when others are rejected; the first rejection is returned.
#[derive(Clone)]
pub struct SeekHandle {
    state: Arc<SeekState>,
    generation: u64,
}

impl SeekHandle {
    pub fn worker(&self) -> &WorkerId {
        &self.state.worker
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this handle may currently seek `partition`.
    pub fn is_valid_for(&self, partition: &TopicPartition) -> bool {
        self.state.owned.read().permits(partition, self.generation)
    }

    /// Number of requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.state.pending.len()
    }
}

impl ConsumerSeekCallback for SeekHandle {
    fn submit(&self, operations: Vec<SeekOperation>) -> Result<()> {
        // Held across the push so a concurrent revocation cannot slip in
        // between the ownership check and the queue write.
        let owned = self.state.owned.read();
        let (admitted, rejection) = self.state.admit(&owned, self.generation, operations);
        self.state.pending.push_all(admitted)?;
        match rejection {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SeekHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekHandle")
            .field("worker", &self.state.worker)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Call-scoped seek callback handed to the assignment and idle hooks.
///
/// Requests are collected locally and applied by the worker as soon as the
/// hook returns, before the next poll. Timestamp requests made during one
/// hook share a single lookup.
pub struct ScopedSeekCallback {
    handle: SeekHandle,
    batch: Mutex<SeekBatch>,
}

impl ScopedSeekCallback {
    pub(crate) fn new(handle: SeekHandle) -> Self {
        Self {
            handle,
            batch: Mutex::new(SeekBatch::new()),
        }
    }

    pub fn worker(&self) -> &WorkerId {
        self.handle.worker()
    }

    /// The worker's durable handle, for listeners that seek later from other
    /// threads.
    pub fn handle(&self) -> SeekHandle {
        self.handle.clone()
    }

    pub(crate) fn into_batch(self) -> SeekBatch {
        self.batch.into_inner()
    }
}

impl ConsumerSeekCallback for ScopedSeekCallback {
    fn submit(&self, operations: Vec<SeekOperation>) -> Result<()> {
        let state = &self.handle.state;
        let owned = state.owned.read();
        let (admitted, rejection) = state.admit(&owned, self.handle.generation, operations);
        let mut batch = self.batch.lock();
        for operation in admitted {
            batch.push(operation);
        }
        match rejection {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
