use crate::types::{TopicPartition, WorkerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeekError>;

#[derive(Error, Debug)]
pub enum SeekError {
    /// A seek handle was used after its worker saw a revocation.
    #[error("Stale seek handle for worker {worker}: partition {partition} was revoked")]
    StaleHandle {
        worker: WorkerId,
        partition: TopicPartition,
    },

    #[error("Partition {partition} is not assigned to worker {worker}")]
    UnassignedPartition {
        worker: WorkerId,
        partition: TopicPartition,
    },

    #[error("No seek callback registered for worker {worker}")]
    NotRegistered { worker: WorkerId },

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeekError {
    /// Get the error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            SeekError::StaleHandle { .. } => "stale_handle",
            SeekError::UnassignedPartition { .. } => "unassigned",
            SeekError::NotRegistered { .. } => "not_registered",
            SeekError::Broker(_) => "broker",
            SeekError::ResourceExhausted(_) => "resource_exhausted",
            SeekError::InvalidConfig(_) | SeekError::Config(_) => "configuration",
            SeekError::Metrics(_) => "metrics",
            SeekError::Io(_) => "io",
        }
    }

    /// Coordination-layer errors are logged and the request dropped; the
    /// polling worker carries on. Everything else goes to the container's
    /// error handling.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SeekError::StaleHandle { .. }
                | SeekError::UnassignedPartition { .. }
                | SeekError::NotRegistered { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordination_errors_are_recoverable() {
        let worker = WorkerId::new("consumer-0");
        let partition = TopicPartition::new("orders", 1);

        let stale = SeekError::StaleHandle {
            worker: worker.clone(),
            partition: partition.clone(),
        };
        assert!(stale.is_recoverable());
        assert_eq!(stale.category(), "stale_handle");
        assert!(stale.to_string().contains("orders:1"));

        let unassigned = SeekError::UnassignedPartition { worker, partition };
        assert!(unassigned.is_recoverable());

        let broker = SeekError::Broker("offset out of range".to_string());
        assert!(!broker.is_recoverable());
        assert_eq!(broker.category(), "broker");
    }
}
