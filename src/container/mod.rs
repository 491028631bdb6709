pub mod registry;
pub mod tracker;
pub mod traits;
pub mod worker;

pub use registry::CallbackRegistry;
pub use tracker::{AssignmentEntry, AssignmentTracker};
pub use traits::*;
pub use worker::PollWorker;

use crate::broker::BrokerClient;
use crate::config::ContainerConfig;
use crate::error::{Result, SeekError};
use crate::listener::{ConsumerSeekAware, NoopSeekAware};
use crate::metrics::{SeekMetrics, SeekMetricsSnapshot};
use crate::seek::SeekHandle;
use crate::types::*;
use prometheus::Registry;
use std::sync::Arc;
use tracing::info;
use worker::WorkerContext;

/// Ties one listener to its polling workers.
///
/// The container owns the assignment tracker, callback registry and metrics
/// shared by all of its workers. Each worker is built with its own broker
/// client and then driven by the caller's poll loop.
pub struct ListenerContainer {
    config: Arc<ContainerConfig>,
    worker_ids: Vec<WorkerId>,
    context: WorkerContext,
}

/// Builder for creating listener containers
pub struct ListenerContainerBuilder {
    config: Option<ContainerConfig>,
    listener: Option<Arc<dyn ConsumerSeekAware>>,
}

impl ListenerContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            listener: None,
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ConsumerSeekAware>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Result<ListenerContainer> {
        let config = self.config.ok_or_else(|| {
            SeekError::InvalidConfig("Container configuration is required".to_string())
        })?;
        config.validate()?;

        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(NoopSeekAware));
        let worker_ids = config.worker_ids();
        let context = WorkerContext {
            listener,
            tracker: Arc::new(AssignmentTracker::new()),
            registry: Arc::new(CallbackRegistry::new()),
            metrics: Arc::new(SeekMetrics::new()?),
            max_pending_seeks: config.max_pending_seeks,
        };

        info!(
            "Created listener container for group {} with {} worker(s)",
            config.group_id,
            worker_ids.len()
        );
        Ok(ListenerContainer {
            config: Arc::new(config),
            worker_ids,
            context,
        })
    }
}

impl Default for ListenerContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerContainer {
    pub fn builder() -> ListenerContainerBuilder {
        ListenerContainerBuilder::new()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn worker_ids(&self) -> &[WorkerId] {
        &self.worker_ids
    }

    /// Build one worker per configured id, each with the broker client
    /// returned by `factory`.
    pub fn create_workers<B, F>(&self, mut factory: F) -> Vec<PollWorker<B>>
    where
        B: BrokerClient,
        F: FnMut(&WorkerId) -> B,
    {
        self.worker_ids
            .iter()
            .map(|id| PollWorker::new(id.clone(), factory(id), self.context.clone()))
            .collect()
    }

    pub fn tracker(&self) -> &Arc<AssignmentTracker> {
        &self.context.tracker
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.context.registry
    }

    pub fn metrics(&self) -> SeekMetricsSnapshot {
        self.context.metrics.snapshot()
    }

    /// Registry holding the container's seek counters, for exporters.
    pub fn metrics_registry(&self) -> &Registry {
        self.context.metrics.registry()
    }

    pub fn handle_for(&self, partition: &TopicPartition) -> Option<SeekHandle> {
        self.context.tracker.handle_for(partition)
    }

    pub fn seek_all_to_beginning(&self) -> Result<()> {
        self.context.tracker.seek_all_to_beginning()
    }

    pub fn seek_all_to_end(&self) -> Result<()> {
        self.context.tracker.seek_all_to_end()
    }

    pub fn seek_all_to_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        self.context.tracker.seek_all_to_timestamp(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;

    #[test]
    fn test_builder_requires_config() {
        let result = ListenerContainer::builder().build();
        assert!(result.is_err());

        let result = ListenerContainer::builder()
            .config(ContainerConfig::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_create_workers_per_concurrency() {
        let mut config = ContainerConfig::new("payments");
        config.client_id = Some("listener".to_string());
        config.concurrency = 3;
        let container = ListenerContainer::builder().config(config).build().unwrap();

        let workers = container.create_workers(|_| MemoryBroker::new());
        let ids: Vec<_> = workers.iter().map(|w| w.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["listener-0", "listener-1", "listener-2"]);
        assert!(container.registry().is_empty());
        assert_eq!(container.metrics_registry().gather().len(), 6);
    }
}
