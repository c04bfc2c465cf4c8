//! Application layer for perfpair.
//!
//! The app layer owns the run: it takes completion events from producers,
//! batches them, hands complete or expired batches to the processor pipeline
//! and reports through the configured publisher. It does not parse CLI flags
//! and it does not do filesystem I/O.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod batching;
pub mod health;
pub mod logging;
pub mod manager;
pub mod pipeline;
pub mod processors;
pub mod queue;
pub mod retry;
pub mod signal;

pub use batching::{AddOutcome, BatchingOptions, BatchingService, DispatchedBatch};
pub use health::{HealthCounters, HealthLevel, QueueHealth};
pub use manager::{RunHandle, RunManager, RunManagerBuilder, RunSummary, TimedOutBatch};
pub use pipeline::{DispatchContext, Pipeline};
pub use processors::{Processor, ProcessorError};
pub use queue::{CompletionQueue, QueueError, QueueStats};
pub use retry::RetryPolicy;
pub use signal::{CancelHandle, RunSignal};

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
