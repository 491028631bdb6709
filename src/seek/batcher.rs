use crate::error::{Result, SeekError};
use crate::types::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::Notify;

/// Seek operations collected between two polls.
///
/// Non-timestamp operations keep arrival order. Timestamp operations are
/// coalesced per partition (last write wins) so the whole batch resolves with
/// a single lookup. An absolute operation cancels any earlier timestamp
/// request for the same partition, so the most recent request always wins.
/// A seek relative to the current position instead moves the pending
/// timestamp request into the ordered list ahead of itself, since it has to
/// start from where that timestamp lands.
#[derive(Debug, Default, Clone)]
pub struct SeekBatch {
    operations: Vec<SeekOperation>,
    timestamps: HashMap<TopicPartition, Timestamp>,
}

impl SeekBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: SeekOperation) {
        match operation.request {
            SeekRequest::ToTimestamp(timestamp) => {
                self.timestamps.insert(operation.partition, timestamp);
            }
            SeekRequest::Relative {
                to_current: true, ..
            } => {
                if let Some(timestamp) = self.timestamps.remove(&operation.partition) {
                    self.operations.push(SeekOperation::new(
                        operation.partition.clone(),
                        SeekRequest::ToTimestamp(timestamp),
                    ));
                }
                self.operations.push(operation);
            }
            _ => {
                self.timestamps.remove(&operation.partition);
                self.operations.push(operation);
            }
        }
    }

    /// Number of entries that would be queued, counting a timestamp request
    /// for an already-pending partition as an overwrite.
    fn growth(&self, operations: &[SeekOperation]) -> usize {
        operations
            .iter()
            .filter(|op| !(op.request.is_timestamp() && self.timestamps.contains_key(&op.partition)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.operations.len() + self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.timestamps.is_empty()
    }

    pub fn operations(&self) -> &[SeekOperation] {
        &self.operations
    }

    pub fn timestamps(&self) -> &HashMap<TopicPartition, Timestamp> {
        &self.timestamps
    }

    /// Keep only entries whose partition satisfies `keep`; returns how many
    /// were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&TopicPartition) -> bool) -> usize {
        let before = self.len();
        self.operations.retain(|op| keep(&op.partition));
        self.timestamps.retain(|tp, _| keep(tp));
        before - self.len()
    }

    pub fn discard(&mut self, partitions: &[TopicPartition]) -> usize {
        self.retain(|tp| !partitions.contains(tp))
    }

    pub fn into_parts(self) -> (Vec<SeekOperation>, HashMap<TopicPartition, Timestamp>) {
        (self.operations, self.timestamps)
    }
}

/// Deferred seeks submitted from outside the polling worker.
///
/// Writers on any thread append under the lock; the owning worker drains the
/// whole batch before its next poll.
#[derive(Debug)]
pub struct PendingSeeks {
    batch: Mutex<SeekBatch>,
    capacity: usize,
    notify: Notify,
}

impl PendingSeeks {
    pub fn new(capacity: usize) -> Self {
        Self {
            batch: Mutex::new(SeekBatch::new()),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Queue all operations or none of them.
    pub fn push_all(&self, operations: Vec<SeekOperation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        {
            let mut batch = self.batch.lock();
            if batch.len() + batch.growth(&operations) > self.capacity {
                return Err(SeekError::ResourceExhausted(format!(
                    "pending seek queue is full ({} entries)",
                    self.capacity
                )));
            }
            for operation in operations {
                batch.push(operation);
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn drain(&self) -> SeekBatch {
        std::mem::take(&mut *self.batch.lock())
    }

    pub fn discard(&self, partitions: &[TopicPartition]) -> usize {
        self.batch.lock().discard(partitions)
    }

    pub fn len(&self) -> usize {
        self.batch.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.lock().is_empty()
    }

    /// Resolves once something has been queued since the last wait.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}
