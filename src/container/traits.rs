use crate::{Result, types::*};
use async_trait::async_trait;
use std::collections::HashMap;

/// Entry points the consumer-group protocol drives on a polling worker.
#[async_trait]
pub trait RebalanceBridge: Send {
    /// `assigned` maps each newly assigned partition to its starting offset.
    async fn partitions_assigned(&mut self, assigned: HashMap<TopicPartition, Offset>) -> Result<()>;
    async fn partitions_revoked(&mut self, revoked: &[TopicPartition]) -> Result<()>;
}

/// Entry point for the container's idle detection.
#[async_trait]
pub trait IdleBridge: Send {
    async fn container_idle(&mut self) -> Result<()>;
}
