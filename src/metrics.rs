use crate::error::Result;
use prometheus::{IntCounter, Registry};
use std::fmt;

/// Seek coordination counters shared by every worker of a container.
///
/// Counters live in the container's own [`Registry`] so the host can gather
/// them next to its other collectors.
pub struct SeekMetrics {
    pub seeks_applied: IntCounter,
    pub timestamp_lookups: IntCounter,
    pub timestamp_fallbacks: IntCounter,
    pub stale_dropped: IntCounter,
    pub unassigned_dropped: IntCounter,
    pub broker_errors: IntCounter,
    registry: Registry,
}

/// Point-in-time copy of [`SeekMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekMetricsSnapshot {
    pub seeks_applied: u64,
    pub timestamp_lookups: u64,
    pub timestamp_fallbacks: u64,
    pub stale_dropped: u64,
    pub unassigned_dropped: u64,
    pub broker_errors: u64,
}

impl SeekMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let seeks_applied = IntCounter::new(
            "seek_operations_applied_total",
            "Seek operations applied through the broker client",
        )?;
        let timestamp_lookups = IntCounter::new(
            "seek_timestamp_lookups_total",
            "Batched offset-for-timestamp lookups issued",
        )?;
        let timestamp_fallbacks = IntCounter::new(
            "seek_timestamp_fallbacks_total",
            "Timestamp seeks with no matching record, sent to the end instead",
        )?;
        let stale_dropped = IntCounter::new(
            "seek_stale_dropped_total",
            "Seek requests dropped because their handle was stale",
        )?;
        let unassigned_dropped = IntCounter::new(
            "seek_unassigned_dropped_total",
            "Seek requests dropped for partitions not owned by the worker",
        )?;
        let broker_errors = IntCounter::new(
            "seek_broker_errors_total",
            "Broker calls that failed while applying seeks",
        )?;

        registry.register(Box::new(seeks_applied.clone()))?;
        registry.register(Box::new(timestamp_lookups.clone()))?;
        registry.register(Box::new(timestamp_fallbacks.clone()))?;
        registry.register(Box::new(stale_dropped.clone()))?;
        registry.register(Box::new(unassigned_dropped.clone()))?;
        registry.register(Box::new(broker_errors.clone()))?;

        Ok(Self {
            seeks_applied,
            timestamp_lookups,
            timestamp_fallbacks,
            stale_dropped,
            unassigned_dropped,
            broker_errors,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_applied(&self, count: u64) {
        self.seeks_applied.inc_by(count);
    }

    pub fn record_lookup(&self) {
        self.timestamp_lookups.inc();
    }

    pub fn record_fallbacks(&self, count: u64) {
        self.timestamp_fallbacks.inc_by(count);
    }

    pub fn record_stale(&self, count: u64) {
        self.stale_dropped.inc_by(count);
    }

    pub fn record_unassigned(&self, count: u64) {
        self.unassigned_dropped.inc_by(count);
    }

    pub fn record_broker_error(&self) {
        self.broker_errors.inc();
    }

    pub fn snapshot(&self) -> SeekMetricsSnapshot {
        SeekMetricsSnapshot {
            seeks_applied: self.seeks_applied.get(),
            timestamp_lookups: self.timestamp_lookups.get(),
            timestamp_fallbacks: self.timestamp_fallbacks.get(),
            stale_dropped: self.stale_dropped.get(),
            unassigned_dropped: self.unassigned_dropped.get(),
            broker_errors: self.broker_errors.get(),
        }
    }
}

impl fmt::Debug for SeekMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SeekMetrics").field(&self.snapshot()).finish()
    }
}
