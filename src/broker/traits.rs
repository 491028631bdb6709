use crate::{Result, types::*};
use async_trait::async_trait;
use std::collections::HashMap;

/// Cursor primitives of the underlying consumer client.
///
/// Every method takes `&mut self`: a client instance belongs to exactly one
/// polling worker and is never driven from two tasks at once.
#[async_trait]
pub trait BrokerClient: Send {
    async fn seek(&mut self, partition: &TopicPartition, offset: Offset) -> Result<()>;
    async fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<()>;
    async fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<()>;
    /// Resolve each timestamp to the first offset at or after it. Partitions
    /// without such a record are left out of the result.
    async fn offsets_for_timestamps(
        &mut self,
        timestamps: &HashMap<TopicPartition, Timestamp>,
    ) -> Result<HashMap<TopicPartition, Offset>>;
    /// Offset of the next record that will be fetched.
    async fn position(&mut self, partition: &TopicPartition) -> Result<Offset>;
}
