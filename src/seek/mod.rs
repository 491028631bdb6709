pub mod applier;
pub mod batcher;
pub mod callback;

pub use applier::apply_batch;
pub use batcher::{PendingSeeks, SeekBatch};
pub use callback::{ConsumerSeekCallback, ScopedSeekCallback, SeekHandle};

pub(crate) use callback::SeekState;
