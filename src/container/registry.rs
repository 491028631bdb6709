use crate::error::{Result, SeekError};
use crate::seek::SeekHandle;
use crate::types::WorkerId;
use dashmap::DashMap;

/// Current seek handle of each polling worker.
///
/// Keyed by worker rather than held globally: one listener may be shared by
/// several workers and each needs its own live handle.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    handles: DashMap<WorkerId, SeekHandle>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle` for `worker`, returning the one it replaces. Requests
    /// already queued through the old handle are left alone.
    pub fn register(&self, worker: WorkerId, handle: SeekHandle) -> Option<SeekHandle> {
        self.handles.insert(worker, handle)
    }

    pub fn current(&self, worker: &WorkerId) -> Result<SeekHandle> {
        self.handles
            .get(worker)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SeekError::NotRegistered {
                worker: worker.clone(),
            })
    }

    pub fn clear(&self, worker: &WorkerId) -> Option<SeekHandle> {
        self.handles.remove(worker).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
