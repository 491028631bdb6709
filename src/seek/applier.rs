use crate::broker::BrokerClient;
use crate::error::{Result, SeekError};
use crate::metrics::SeekMetrics;
use crate::seek::batcher::SeekBatch;
use crate::types::*;
use std::collections::HashMap;
use std::slice;
use tracing::{debug, error, warn};

/// Apply a drained batch through the worker's own broker client.
///
/// Ordered operations go first, then every coalesced timestamp request is
/// resolved with one `offsets_for_timestamps` call. A timestamp request that
/// had to stay in order ahead of a current-relative seek is looked up on its
/// own. A broker failure on one partition
/// does not stop the others; the first failure is returned once the batch is
/// done.
pub async fn apply_batch<B>(broker: &mut B, batch: SeekBatch, metrics: &SeekMetrics) -> Result<()>
where
    B: BrokerClient + ?Sized,
{
    let (operations, timestamps) = batch.into_parts();
    let mut first_error: Option<SeekError> = None;

    for operation in &operations {
        match apply_operation(broker, operation, metrics).await {
            // Timestamp operations record their own outcome.
            Ok(()) if operation.request.is_timestamp() => {}
            Err(e) if operation.request.is_timestamp() => {
                first_error.get_or_insert(e);
            }
            Ok(()) => {
                metrics.record_applied(1);
                debug!("Seeked {} to {}", operation.partition, operation.request);
            }
            Err(e) => {
                error!(
                    "Failed to seek {} to {}: {}",
                    operation.partition, operation.request, e
                );
                metrics.record_broker_error();
                first_error.get_or_insert(e);
            }
        }
    }

    if !timestamps.is_empty() {
        if let Err(e) = apply_timestamps(broker, timestamps, metrics).await {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn apply_operation<B>(
    broker: &mut B,
    operation: &SeekOperation,
    metrics: &SeekMetrics,
) -> Result<()>
where
    B: BrokerClient + ?Sized,
{
    let partition = &operation.partition;
    match operation.request {
        SeekRequest::ToOffset(offset) => broker.seek(partition, offset).await,
        SeekRequest::ToBeginning => broker.seek_to_beginning(slice::from_ref(partition)).await,
        SeekRequest::ToEnd => broker.seek_to_end(slice::from_ref(partition)).await,
        SeekRequest::Relative { delta, to_current } => {
            seek_relative(broker, partition, delta, to_current).await
        }
        SeekRequest::ToTimestamp(timestamp) => {
            let single = HashMap::from([(partition.clone(), timestamp)]);
            apply_timestamps(broker, single, metrics).await
        }
    }
}

/// | delta | to_current | base      |
/// |-------|------------|-----------|
/// | < 0   | false      | end       |
/// | >= 0  | false      | beginning |
/// | any   | true       | position  |
async fn seek_relative<B>(
    broker: &mut B,
    partition: &TopicPartition,
    delta: i64,
    to_current: bool,
) -> Result<()>
where
    B: BrokerClient + ?Sized,
{
    if !to_current {
        if delta < 0 {
            broker.seek_to_end(slice::from_ref(partition)).await?;
        } else {
            broker.seek_to_beginning(slice::from_ref(partition)).await?;
        }
    }
    let base = broker.position(partition).await?;

    let target = match base.checked_add_signed(delta) {
        Some(target) => target,
        None => {
            warn!(
                "Relative seek {:+} from {} on {} is before offset 0, clamping",
                delta, base, partition
            );
            0
        }
    };
    broker.seek(partition, target).await
}

async fn apply_timestamps<B>(
    broker: &mut B,
    timestamps: HashMap<TopicPartition, Timestamp>,
    metrics: &SeekMetrics,
) -> Result<()>
where
    B: BrokerClient + ?Sized,
{
    metrics.record_lookup();
    let resolved = match broker.offsets_for_timestamps(&timestamps).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(
                "Timestamp lookup for {} partition(s) failed: {}",
                timestamps.len(),
                e
            );
            metrics.record_broker_error();
            return Err(e);
        }
    };

    let mut partitions: Vec<TopicPartition> = timestamps.into_keys().collect();
    partitions.sort();

    let mut first_error: Option<SeekError> = None;
    let mut unresolved = Vec::new();
    for partition in partitions {
        let Some(&offset) = resolved.get(&partition) else {
            unresolved.push(partition);
            continue;
        };
        match broker.seek(&partition, offset).await {
            Ok(()) => {
                metrics.record_applied(1);
                debug!("Seeked {} to offset {} by timestamp", partition, offset);
            }
            Err(e) => {
                error!("Failed to seek {} to offset {}: {}", partition, offset, e);
                metrics.record_broker_error();
                first_error.get_or_insert(e);
            }
        }
    }

    if !unresolved.is_empty() {
        warn!(
            "No record at or after the requested timestamp for {:?}, seeking to end",
            unresolved.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        metrics.record_fallbacks(unresolved.len() as u64);
        match broker.seek_to_end(&unresolved).await {
            Ok(()) => metrics.record_applied(unresolved.len() as u64),
            Err(e) => {
                error!("Failed to seek unresolved partitions to end: {}", e);
                metrics.record_broker_error();
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
