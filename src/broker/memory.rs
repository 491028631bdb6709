use crate::broker::traits::BrokerClient;
use crate::error::{Result, SeekError};
use crate::types::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Calls observed by a [`MemoryBroker`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    Seek(TopicPartition, Offset),
    SeekToBeginning(Vec<TopicPartition>),
    SeekToEnd(Vec<TopicPartition>),
    OffsetsForTimestamps(Vec<TopicPartition>),
    Position(TopicPartition),
}

#[derive(Debug, Clone)]
struct PartitionLog {
    log_start_offset: Offset,
    /// Timestamp of the record at `log_start_offset + index`
    timestamps: Vec<Timestamp>,
}

impl PartitionLog {
    fn log_end_offset(&self) -> Offset {
        self.log_start_offset + self.timestamps.len() as u64
    }

    fn clamp(&self, offset: Offset) -> Offset {
        offset.clamp(self.log_start_offset, self.log_end_offset())
    }
}

/// In-memory consumer client over fixed partition logs.
///
/// Seeks are clamped to the log bounds the way a broker resets an
/// out-of-range fetch position.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    logs: HashMap<TopicPartition, PartitionLog>,
    positions: HashMap<TopicPartition, Offset>,
    rejected: HashSet<TopicPartition>,
    calls: Vec<BrokerCall>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a partition holding records `[log_start_offset, log_end_offset)`
    /// with timestamps `first_timestamp`, `first_timestamp + 1`, ... The
    /// position starts at `log_start_offset`.
    pub fn with_partition(
        mut self,
        partition: TopicPartition,
        log_start_offset: Offset,
        log_end_offset: Offset,
        first_timestamp: Timestamp,
    ) -> Self {
        let count = log_end_offset.saturating_sub(log_start_offset);
        let timestamps = (0..count).map(|i| first_timestamp + i as i64).collect();
        self.add_log(partition, log_start_offset, timestamps);
        self
    }

    /// Add a partition with explicit record timestamps.
    pub fn with_timestamps(
        mut self,
        partition: TopicPartition,
        log_start_offset: Offset,
        timestamps: Vec<Timestamp>,
    ) -> Self {
        self.add_log(partition, log_start_offset, timestamps);
        self
    }

    fn add_log(&mut self, partition: TopicPartition, log_start_offset: Offset, timestamps: Vec<Timestamp>) {
        self.positions.insert(partition.clone(), log_start_offset);
        self.logs.insert(
            partition,
            PartitionLog {
                log_start_offset,
                timestamps,
            },
        );
    }

    /// Make every subsequent cursor call on `partition` fail.
    pub fn reject(&mut self, partition: TopicPartition) {
        self.rejected.insert(partition);
    }

    /// Set the position directly, bypassing call recording.
    pub fn set_position(&mut self, partition: &TopicPartition, offset: Offset) {
        if let Some(log) = self.logs.get(partition) {
            let clamped = log.clamp(offset);
            self.positions.insert(partition.clone(), clamped);
        }
    }

    pub fn current_position(&self, partition: &TopicPartition) -> Option<Offset> {
        self.positions.get(partition).copied()
    }

    pub fn calls(&self) -> &[BrokerCall] {
        &self.calls
    }

    /// Calls other than `position` lookups.
    pub fn cursor_calls(&self) -> Vec<BrokerCall> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, BrokerCall::Position(_)))
            .cloned()
            .collect()
    }

    pub fn lookup_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BrokerCall::OffsetsForTimestamps(_)))
            .count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn log(&self, partition: &TopicPartition) -> Result<&PartitionLog> {
        if self.rejected.contains(partition) {
            return Err(SeekError::Broker(format!(
                "request rejected for partition {}",
                partition
            )));
        }
        self.logs
            .get(partition)
            .ok_or_else(|| SeekError::Broker(format!("unknown partition {}", partition)))
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn seek(&mut self, partition: &TopicPartition, offset: Offset) -> Result<()> {
        self.calls.push(BrokerCall::Seek(partition.clone(), offset));
        let clamped = self.log(partition)?.clamp(offset);
        if clamped != offset {
            debug!("Clamped seek on {} from {} to {}", partition, offset, clamped);
        }
        self.positions.insert(partition.clone(), clamped);
        Ok(())
    }

    async fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.calls.push(BrokerCall::SeekToBeginning(partitions.to_vec()));
        for partition in partitions {
            let start = self.log(partition)?.log_start_offset;
            self.positions.insert(partition.clone(), start);
        }
        Ok(())
    }

    async fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        self.calls.push(BrokerCall::SeekToEnd(partitions.to_vec()));
        for partition in partitions {
            let end = self.log(partition)?.log_end_offset();
            self.positions.insert(partition.clone(), end);
        }
        Ok(())
    }

    async fn offsets_for_timestamps(
        &mut self,
        timestamps: &HashMap<TopicPartition, Timestamp>,
    ) -> Result<HashMap<TopicPartition, Offset>> {
        let mut requested: Vec<TopicPartition> = timestamps.keys().cloned().collect();
        requested.sort();
        self.calls.push(BrokerCall::OffsetsForTimestamps(requested));

        let mut offsets = HashMap::with_capacity(timestamps.len());
        for (partition, timestamp) in timestamps {
            let log = self.log(partition)?;
            if let Some(index) = log.timestamps.iter().position(|ts| ts >= timestamp) {
                offsets.insert(partition.clone(), log.log_start_offset + index as u64);
            }
        }
        Ok(offsets)
    }

    async fn position(&mut self, partition: &TopicPartition) -> Result<Offset> {
        self.calls.push(BrokerCall::Position(partition.clone()));
        self.log(partition)?;
        self.positions
            .get(partition)
            .copied()
            .ok_or_else(|| SeekError::Broker(format!("no position for {}", partition)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seek_is_clamped_to_log_bounds() {
        let tp = TopicPartition::new("orders", 0);
        let mut broker = MemoryBroker::new().with_partition(tp.clone(), 10, 20, 1_000);

        broker.seek(&tp, 5).await.unwrap();
        assert_eq!(broker.current_position(&tp), Some(10));

        broker.seek(&tp, 50).await.unwrap();
        assert_eq!(broker.current_position(&tp), Some(20));

        broker.seek(&tp, 15).await.unwrap();
        assert_eq!(broker.position(&tp).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_offsets_for_timestamps_skips_unresolved() {
        let p0 = TopicPartition::new("orders", 0);
        let p1 = TopicPartition::new("orders", 1);
        let mut broker = MemoryBroker::new()
            .with_timestamps(p0.clone(), 0, vec![100, 200, 300])
            .with_timestamps(p1.clone(), 0, vec![100, 150]);

        let request = HashMap::from([(p0.clone(), 250), (p1.clone(), 250)]);
        let offsets = broker.offsets_for_timestamps(&request).await.unwrap();

        assert_eq!(offsets.get(&p0), Some(&2));
        assert!(!offsets.contains_key(&p1));
        assert_eq!(broker.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_partition_fails() {
        let tp = TopicPartition::new("orders", 0);
        let mut broker = MemoryBroker::new().with_partition(tp.clone(), 0, 10, 0);
        broker.reject(tp.clone());

        let err = broker.seek(&tp, 3).await.unwrap_err();
        assert_eq!(err.category(), "broker");
        assert_eq!(broker.current_position(&tp), Some(0));
    }
}
