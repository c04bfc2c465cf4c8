//! Groups completion events into batches and decides when a batch is ready.
//!
//! One lock guards the batch map; it is never held across statistics or
//! publishing. Callers hand ready batches off after `add` returns.

use crate::lock;
use perfpair_types::{
    BatchKey, BatchState, BatchingStrategy, ClassCatalog, CompletionEvent, DispatchReason,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A batch that has left the batching service.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedBatch {
    pub key: BatchKey,
    pub reason: DispatchReason,
    pub expected: usize,
    /// Members in arrival order.
    pub members: Vec<CompletionEvent>,
}

impl DispatchedBatch {
    pub fn standalone(key: BatchKey, event: CompletionEvent) -> Self {
        Self {
            key,
            reason: DispatchReason::Standalone,
            expected: 1,
            members: vec![event],
        }
    }

    pub fn is_partial(&self) -> bool {
        self.members.len() < self.expected
    }
}

#[derive(Debug, PartialEq)]
pub enum AddOutcome {
    Buffered,
    Ready(DispatchedBatch),
}

#[derive(Debug)]
struct Batch {
    expected: usize,
    members: Vec<CompletionEvent>,
    ids: HashSet<String>,
    deadline: Instant,
    state: BatchState,
}

impl Batch {
    /// Move the members out and record why the batch left (`Complete` or
    /// `TimedOut`). The key stays closed from here on.
    fn seal(&mut self, key: &BatchKey, state: BatchState) -> DispatchedBatch {
        self.state = state;
        let reason = match state {
            BatchState::TimedOut => DispatchReason::TimedOut,
            _ => DispatchReason::Complete,
        };
        DispatchedBatch {
            key: key.clone(),
            reason,
            expected: self.expected,
            members: std::mem::take(&mut self.members),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchingOptions {
    pub enabled: bool,
    pub strategy: BatchingStrategy,
    pub max_batch_size: usize,
    pub completion_timeout: Duration,
}

#[derive(Debug)]
pub struct BatchingService {
    catalog: Arc<ClassCatalog>,
    options: BatchingOptions,
    batches: Mutex<HashMap<BatchKey, Batch>>,
}

impl BatchingService {
    pub fn new(catalog: Arc<ClassCatalog>, options: BatchingOptions) -> Self {
        Self {
            catalog,
            options,
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// Batching key of an event under the configured strategy.
    pub fn key_for(&self, event: &CompletionEvent) -> BatchKey {
        match self.options.strategy {
            BatchingStrategy::ByTestClass => BatchKey::class(&event.test_class_name),
            BatchingStrategy::ByComparisonGroup => {
                let group = event.comparison_group.clone().or_else(|| {
                    self.catalog
                        .get(&event.test_class_name)
                        .and_then(|c| c.group_of(&event.method_name))
                        .cloned()
                });
                match group {
                    Some(group) => BatchKey::class_and_group(&event.test_class_name, group),
                    None => BatchKey::class(&event.test_class_name),
                }
            }
        }
    }

    fn expected_for(&self, key: &BatchKey) -> usize {
        let declared = match (self.options.strategy, &key.group) {
            // the class-only key collects the ungrouped methods
            (BatchingStrategy::ByComparisonGroup, None) => self.catalog.get(&key.class).map(|c| {
                c.methods().iter().filter(|m| m.group.is_none()).count()
            }),
            _ => self.catalog.declared_members(key),
        };
        match declared {
            Some(declared) => declared.clamp(1, self.options.max_batch_size.max(1)),
            None => {
                warn!(batch = %key, "class not registered; dispatching members individually");
                1
            }
        }
    }

    /// Add an event. Returns the batch to dispatch when this event completes it.
    pub fn add(&self, event: CompletionEvent, now: Instant) -> AddOutcome {
        let key = self.key_for(&event);
        if !self.options.enabled {
            return AddOutcome::Ready(DispatchedBatch::standalone(key, event));
        }

        let mut batches = lock(&self.batches);
        let batch = batches.entry(key.clone()).or_insert_with(|| {
            let expected = self.expected_for(&key);
            Batch {
                expected,
                members: Vec::with_capacity(expected),
                ids: HashSet::new(),
                deadline: now + self.options.completion_timeout,
                state: BatchState::Open,
            }
        });

        if batch.state != BatchState::Open {
            warn!(batch = %key, test_case = %event.test_case_id, "late event for dispatched batch");
            return AddOutcome::Ready(DispatchedBatch::standalone(key, event));
        }
        if !batch.ids.insert(event.test_case_id.clone()) {
            warn!(batch = %key, test_case = %event.test_case_id, "duplicate event in open batch");
            return AddOutcome::Ready(DispatchedBatch::standalone(key, event));
        }

        batch.members.push(event);
        debug!(
            batch = %key,
            members = batch.members.len(),
            expected = batch.expected,
            "event batched"
        );
        if batch.members.len() >= batch.expected {
            return AddOutcome::Ready(batch.seal(&key, BatchState::Complete));
        }
        AddOutcome::Buffered
    }

    /// Seal every open batch whose deadline is at or before `now`.
    pub fn sweep_expired(&self, now: Instant) -> Vec<DispatchedBatch> {
        self.seal_open(|batch| batch.deadline <= now)
    }

    /// Seal every open batch regardless of deadline.
    pub fn flush_open(&self) -> Vec<DispatchedBatch> {
        self.seal_open(|_| true)
    }

    fn seal_open(&self, due: impl Fn(&Batch) -> bool) -> Vec<DispatchedBatch> {
        let mut batches = lock(&self.batches);
        let mut sealed: Vec<DispatchedBatch> = batches
            .iter_mut()
            .filter(|(_, b)| b.state == BatchState::Open && due(b))
            .map(|(key, b)| b.seal(key, BatchState::TimedOut))
            .collect();
        sealed.sort_by(|a, b| a.key.cmp(&b.key));
        for batch in &sealed {
            debug!(
                batch = %batch.key,
                present = batch.members.len(),
                expected = batch.expected,
                "open batch sealed"
            );
        }
        sealed
    }

    /// Record that a sealed batch has been picked up by the dispatcher.
    /// Open batches and unknown keys are left alone.
    pub fn mark_dispatched(&self, key: &BatchKey) {
        if let Some(batch) = lock(&self.batches).get_mut(key)
            && matches!(batch.state, BatchState::Complete | BatchState::TimedOut)
        {
            batch.state = BatchState::Dispatched;
        }
    }

    pub fn state_of(&self, key: &BatchKey) -> Option<BatchState> {
        lock(&self.batches).get(key).map(|b| b.state)
    }

    pub fn open_count(&self) -> usize {
        lock(&self.batches)
            .values()
            .filter(|b| b.state == BatchState::Open)
            .count()
    }
}
