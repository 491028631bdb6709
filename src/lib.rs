//! Partition seek coordination for RustMQ listener containers.
//!
//! Listener code asks to move a partition's read cursor from wherever it
//! happens to run; the polling worker that owns the partition applies the
//! request through its own broker client at the next safe point, and never
//! after the partition has been revoked.

pub mod broker;
pub mod config;
pub mod container;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod seek;
pub mod types;

pub use broker::{BrokerClient, MemoryBroker};
pub use config::ContainerConfig;
pub use container::{
    AssignmentTracker, CallbackRegistry, IdleBridge, ListenerContainer,
    ListenerContainerBuilder, PollWorker, RebalanceBridge,
};
pub use error::{Result, SeekError};
pub use listener::{ConsumerSeekAware, NoopSeekAware, SeekCallbacks};
pub use metrics::{SeekMetrics, SeekMetricsSnapshot};
pub use seek::{ConsumerSeekCallback, ScopedSeekCallback, SeekHandle};
pub use types::*;
