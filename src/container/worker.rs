use crate::broker::BrokerClient;
use crate::container::traits::{IdleBridge, RebalanceBridge};
use crate::container::{AssignmentTracker, CallbackRegistry};
use crate::error::Result;
use crate::listener::ConsumerSeekAware;
use crate::metrics::SeekMetrics;
use crate::seek::{apply_batch, ScopedSeekCallback, SeekBatch, SeekHandle, SeekState};
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State a container shares with each of its workers
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) listener: Arc<dyn ConsumerSeekAware>,
    pub(crate) tracker: Arc<AssignmentTracker>,
    pub(crate) registry: Arc<CallbackRegistry>,
    pub(crate) metrics: Arc<SeekMetrics>,
    pub(crate) max_pending_seeks: usize,
}

/// One polling worker and the broker client it exclusively owns.
///
/// The poll loop calls [`process_pending_seeks`] before every poll; the group
/// protocol and idle detection drive it through [`RebalanceBridge`] and
/// [`IdleBridge`]. All broker traffic happens on the task that owns the
/// worker.
///
/// [`process_pending_seeks`]: PollWorker::process_pending_seeks
pub struct PollWorker<B> {
    id: WorkerId,
    broker: B,
    state: Arc<SeekState>,
    context: WorkerContext,
    running: bool,
}

impl<B: BrokerClient> PollWorker<B> {
    pub(crate) fn new(id: WorkerId, broker: B, context: WorkerContext) -> Self {
        let state = Arc::new(SeekState::new(
            id.clone(),
            context.max_pending_seeks,
            context.metrics.clone(),
        ));
        Self {
            id,
            broker,
            state,
            context,
            running: false,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Partitions this worker currently owns.
    pub fn assigned_partitions(&self) -> Vec<TopicPartition> {
        self.state.owned_partitions()
    }

    pub fn owns(&self, partition: &TopicPartition) -> bool {
        self.state.owns(partition)
    }

    pub fn pending_seeks(&self) -> usize {
        self.state.pending().len()
    }

    /// Register the worker's handle and hand it to the listener.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.register();
        info!("Started polling worker {}", self.id);
    }

    /// Revoke everything the worker owns and unregister its handle.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        let owned = self.state.owned_partitions();
        let dropped = self.state.revoke(&owned);
        if dropped > 0 {
            warn!(
                "Dropped {} queued seek(s) while stopping worker {}",
                dropped, self.id
            );
            self.context.metrics.record_stale(dropped as u64);
        }
        self.context.tracker.release(&self.id, &owned);
        if !owned.is_empty() {
            self.context.listener.on_partitions_revoked(&owned);
        }
        self.context.registry.clear(&self.id);
        self.context.listener.unregister_seek_callback(&self.id);
        info!("Stopped polling worker {}", self.id);
    }

    /// Apply every deferred seek queued since the last call. Timestamp
    /// requests are resolved with one lookup.
    pub async fn process_pending_seeks(&mut self) -> Result<()> {
        let batch = self.state.drain_pending();
        self.apply(batch).await
    }

    /// Wait until a deferred seek is queued.
    pub async fn wait_for_seeks(&self) {
        self.state.pending().notified().await
    }

    fn register(&self) -> SeekHandle {
        let handle = self.state.handle();
        self.context
            .registry
            .register(self.id.clone(), handle.clone());
        self.context.listener.register_seek_callback(handle.clone());
        debug!(
            "Registered seek callback for worker {} (generation {})",
            self.id,
            handle.generation()
        );
        handle
    }

    async fn apply(&mut self, batch: SeekBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        apply_batch(&mut self.broker, batch, &self.context.metrics).await
    }
}

#[async_trait]
impl<B: BrokerClient> RebalanceBridge for PollWorker<B> {
    async fn partitions_assigned(&mut self, assigned: HashMap<TopicPartition, Offset>) -> Result<()> {
        let mut partitions: Vec<TopicPartition> = assigned.keys().cloned().collect();
        partitions.sort();

        self.state.assign(partitions.iter().cloned());
        let handle = self.register();
        self.context.tracker.bind(partitions.iter().cloned(), &handle);
        info!(
            "Worker {} assigned partitions {:?}",
            self.id,
            partitions.iter().map(ToString::to_string).collect::<Vec<_>>()
        );

        let callback = ScopedSeekCallback::new(handle);
        self.context
            .listener
            .on_partitions_assigned(&assigned, &callback);
        self.apply(callback.into_batch()).await
    }

    async fn partitions_revoked(&mut self, revoked: &[TopicPartition]) -> Result<()> {
        let dropped = self.state.revoke(revoked);
        if dropped > 0 {
            warn!(
                "Dropped {} queued seek(s) for partitions revoked from worker {}",
                dropped, self.id
            );
            self.context.metrics.record_stale(dropped as u64);
        }
        self.context.tracker.release(&self.id, revoked);
        info!(
            "Worker {} revoked partitions {:?}",
            self.id,
            revoked.iter().map(ToString::to_string).collect::<Vec<_>>()
        );

        self.context.listener.on_partitions_revoked(revoked);
        self.context.registry.clear(&self.id);
        Ok(())
    }
}

#[async_trait]
impl<B: BrokerClient> IdleBridge for PollWorker<B> {
    async fn container_idle(&mut self) -> Result<()> {
        let partitions = self.state.owned_partitions();
        let mut positions = HashMap::with_capacity(partitions.len());
        for partition in partitions {
            let offset = self.broker.position(&partition).await?;
            positions.insert(partition, offset);
        }
        debug!(
            "Worker {} idle with {} partition(s)",
            self.id,
            positions.len()
        );

        let callback = ScopedSeekCallback::new(self.state.handle());
        self.context
            .listener
            .on_idle_container(&positions, &callback);
        self.apply(callback.into_batch()).await
    }
}
