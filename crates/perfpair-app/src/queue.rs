//! Bounded intake for completion events.
//!
//! Many producers, one logical consumer loop. A rejected event is handed back
//! inside the error so the caller can route it to fallback publishing.

use crate::lock;
use crate::signal::RunSignal;
use perfpair_error::PerfpairError;
use perfpair_types::CompletionEvent;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue full: {} rejected after {timeout_ms} ms", .event.test_case_id)]
    Full {
        event: Box<CompletionEvent>,
        timeout_ms: u64,
    },

    #[error("queue closed: {} rejected", .0.test_case_id)]
    Closed(Box<CompletionEvent>),
}

impl QueueError {
    pub fn event(&self) -> &CompletionEvent {
        match self {
            QueueError::Full { event, .. } | QueueError::Closed(event) => event,
        }
    }

    pub fn into_event(self) -> CompletionEvent {
        match self {
            QueueError::Full { event, .. } | QueueError::Closed(event) => *event,
        }
    }
}

impl From<&QueueError> for PerfpairError {
    fn from(err: &QueueError) -> Self {
        match err {
            QueueError::Full { event, timeout_ms } => PerfpairError::QueueFull {
                test_case_id: event.test_case_id.clone(),
                timeout_ms: *timeout_ms,
            },
            QueueError::Closed(event) => PerfpairError::QueueClosed {
                test_case_id: event.test_case_id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub capacity: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    pub rejected: u64,
    pub depth: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug)]
pub struct CompletionQueue {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<CompletionEvent>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<CompletionEvent>>,
    counters: Counters,
}

impl CompletionQueue {
    /// `capacity` must be non-zero; configuration validation guarantees it.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            capacity,
            sender: Mutex::new(Some(tx)),
            receiver: tokio::sync::Mutex::new(rx),
            counters: Counters::default(),
        }
    }

    /// Enqueue `event`, waiting up to `timeout` for room. A zero timeout never waits.
    pub async fn enqueue(&self, event: CompletionEvent, timeout: Duration) -> Result<(), QueueError> {
        let sender = lock(&self.sender).clone();
        let Some(sender) = sender else {
            return Err(self.reject(QueueError::Closed(Box::new(event))));
        };
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        let result = match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(event)) => Err(QueueError::Closed(Box::new(event))),
            Err(TrySendError::Full(event)) if timeout.is_zero() => Err(QueueError::Full {
                event: Box::new(event),
                timeout_ms,
            }),
            Err(TrySendError::Full(event)) => match sender.send_timeout(event, timeout).await {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(event)) => Err(QueueError::Full {
                    event: Box::new(event),
                    timeout_ms,
                }),
                Err(SendTimeoutError::Closed(event)) => Err(QueueError::Closed(Box::new(event))),
            },
        };

        match result {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => Err(self.reject(err)),
        }
    }

    fn reject(&self, err: QueueError) -> QueueError {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        err
    }

    /// Next event, or `None` once the queue is closed and drained or the run
    /// is cancelled.
    pub async fn dequeue(&self, signal: &mut RunSignal) -> Option<CompletionEvent> {
        let mut rx = self.receiver.lock().await;
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = signal.cancelled() => None,
        };
        if event.is_some() {
            self.counters.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        event
    }

    /// Whatever is buffered right now, without waiting.
    pub async fn drain_now(&self) -> Vec<CompletionEvent> {
        let mut rx = self.receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        self.counters
            .dequeued
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        drained
    }

    /// Stop intake. Buffered events are still delivered to consumers, after
    /// which `dequeue` returns `None`.
    pub fn close(&self) {
        lock(&self.sender).take();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    pub fn stats(&self) -> QueueStats {
        let enqueued = self.counters.enqueued.load(Ordering::Relaxed);
        let dequeued = self.counters.dequeued.load(Ordering::Relaxed);
        QueueStats {
            capacity: self.capacity,
            enqueued,
            dequeued,
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            depth: enqueued.saturating_sub(dequeued),
        }
    }
}
