use serde::{Deserialize, Serialize};
use std::fmt;

pub type TopicName = String;
pub type PartitionId = u32;
pub type Offset = u64;
/// Record timestamp in milliseconds since the Unix epoch.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new(topic: impl Into<TopicName>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

/// Identity of a polling worker inside a listener container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repositioning request for a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekRequest {
    ToOffset(Offset),
    ToBeginning,
    ToEnd,
    /// Negative deltas count back from the end (or the current position),
    /// non-negative deltas count forward from the beginning (or the current
    /// position).
    Relative { delta: i64, to_current: bool },
    ToTimestamp(Timestamp),
}

impl SeekRequest {
    pub fn is_timestamp(&self) -> bool {
        matches!(self, SeekRequest::ToTimestamp(_))
    }
}

impl fmt::Display for SeekRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekRequest::ToOffset(offset) => write!(f, "offset {}", offset),
            SeekRequest::ToBeginning => f.write_str("beginning"),
            SeekRequest::ToEnd => f.write_str("end"),
            SeekRequest::Relative { delta, to_current: true } => {
                write!(f, "current {:+}", delta)
            }
            SeekRequest::Relative { delta, to_current: false } if *delta < 0 => {
                write!(f, "end {}", delta)
            }
            SeekRequest::Relative { delta, .. } => write!(f, "beginning +{}", delta),
            SeekRequest::ToTimestamp(ts) => write!(f, "timestamp {}", ts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekOperation {
    pub partition: TopicPartition,
    pub request: SeekRequest,
}

impl SeekOperation {
    pub fn new(partition: TopicPartition, request: SeekRequest) -> Self {
        Self { partition, request }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_partition_display() {
        let tp = TopicPartition::new("orders", 3);
        assert_eq!(tp.to_string(), "orders:3");
    }

    #[test]
    fn test_seek_request_display() {
        assert_eq!(SeekRequest::ToOffset(42).to_string(), "offset 42");
        assert_eq!(
            SeekRequest::Relative { delta: -5, to_current: false }.to_string(),
            "end -5"
        );
        assert_eq!(
            SeekRequest::Relative { delta: 5, to_current: false }.to_string(),
            "beginning +5"
        );
        assert_eq!(
            SeekRequest::Relative { delta: -1, to_current: true }.to_string(),
            "current -1"
        );
        assert!(SeekRequest::ToTimestamp(1_700_000_000_000).is_timestamp());
        assert!(!SeekRequest::ToEnd.is_timestamp());
    }
}
