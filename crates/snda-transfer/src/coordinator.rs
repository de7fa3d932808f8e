//! Transfer coordinator
//!
//! Drives one operation from its unit list to a terminal event: fans units
//! out to a [`WorkerPool`], folds results back in, retries ignorable
//! failures, batches progress and decides the terminal outcome.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::emitter::{EventEmitter, TransferObserver};
use crate::error::ConfigError;
use crate::event::{CompletedUnit, EventKind, IgnoredFailure, OperationId, TransferEvent};
use crate::pool::{Completion, UnitExecutor, WorkerPool};
use crate::tracker::ProgressTracker;
use crate::unit::{TransferUnit, UnitPayload};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Units in flight at once
    pub concurrency: usize,
    /// Executions per unit before an ignorable failure abandons it
    pub max_attempts: u32,
    /// Minimum spacing of `IN_PROGRESS` / `IGNORED_ERRORS` events. Zero
    /// emits one event per finished unit.
    pub progress_interval: Duration,
    pub retry_base_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            progress_interval: Duration::from_millis(500),
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

impl TransferConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Requests cancellation of a running operation from anywhere
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// No new units are started after this. Units already running finish.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.0.clone()
    }
}

/// A fixed list of units executed as one logical transfer
#[derive(Debug)]
pub struct Operation {
    id: OperationId,
    units: Vec<TransferUnit>,
    cancel: CancelHandle,
}

impl Operation {
    pub fn new(units: Vec<TransferUnit>) -> Self {
        Self::with_id(OperationId::generate(), units)
    }

    pub fn with_id(id: OperationId, units: Vec<TransferUnit>) -> Self {
        Self {
            id,
            units,
            cancel: CancelHandle::default(),
        }
    }

    /// Share a handle created before the operation, so the caller can
    /// cancel while `execute` owns the operation.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn units(&self) -> &[TransferUnit] {
        &self.units
    }

    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    /// Sum of the unit byte ranges, if every unit carries one
    pub fn total_bytes(&self) -> Option<u64> {
        self.units
            .iter()
            .map(|u| match u.payload() {
                UnitPayload::Range { .. } => Some(u.payload().byte_len()),
                UnitPayload::Upload { .. } => None,
            })
            .sum()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Completions and failures not yet reported
struct Batch<O, E> {
    completed: Vec<CompletedUnit<O>>,
    ignored: Vec<IgnoredFailure<E>>,
    last_flush: Instant,
}

impl<O, E> Batch<O, E> {
    fn new() -> Self {
        Self {
            completed: Vec::new(),
            ignored: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.ignored.is_empty()
    }

    fn deadline(&self, interval: Duration) -> Instant {
        self.last_flush + interval
    }

    fn is_due(&self, interval: Duration) -> bool {
        !self.is_empty() && self.last_flush.elapsed() >= interval
    }

    fn flush(&mut self, emitter: &mut EventEmitter<'_, O, E>, tracker: &ProgressTracker) {
        if !self.completed.is_empty() {
            let units = std::mem::take(&mut self.completed);
            emitter.emit(EventKind::InProgress(units), tracker.snapshot());
        }
        if !self.ignored.is_empty() {
            let failures = std::mem::take(&mut self.ignored);
            emitter.emit(EventKind::IgnoredErrors(failures), tracker.snapshot());
        }
        self.last_flush = Instant::now();
    }
}

enum Wake<T> {
    Finished(Option<T>),
    FlushDue,
}

/// Runs operations against a bounded pool of workers
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    config: TransferConfig,
}

impl TransferCoordinator {
    pub fn new(config: TransferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Run `operation` to completion.
    ///
    /// `observer` sees every event in order, on the calling task. The
    /// returned event is the terminal one and has already been delivered.
    /// Failures for which `is_ignorable` returns false end the operation
    /// with `ERROR`; the rest are retried up to `max_attempts` times.
    pub async fn execute<X, F>(
        &self,
        operation: Operation,
        executor: Arc<X>,
        is_ignorable: F,
        observer: &mut dyn TransferObserver<X::Output, X::Error>,
    ) -> TransferEvent<X::Output, X::Error>
    where
        X: UnitExecutor,
        F: Fn(&X::Error) -> bool,
    {
        let total = operation.total_units();
        let tracker = Arc::new(ProgressTracker::new(total, operation.total_bytes()));
        let Operation { id, units, cancel } = operation;

        let mut emitter = EventEmitter::new(id.clone());
        emitter.register(observer);
        emitter.emit(EventKind::Started, tracker.snapshot());
        info!(
            operation = %id,
            units = total,
            concurrency = self.config.concurrency,
            "transfer started"
        );

        if units.is_empty() {
            return emitter.emit(EventKind::Completed { abandoned: Vec::new() }, tracker.snapshot());
        }

        let mut pool = WorkerPool::new(
            self.config.concurrency.min(total),
            executor,
            Arc::clone(&tracker),
            self.config.retry_base_delay,
            cancel.token(),
        );

        let interval = self.config.progress_interval;
        let mut queue: VecDeque<(usize, TransferUnit)> =
            units.iter().cloned().enumerate().collect();
        let mut completed = vec![false; total];
        let mut abandoned = vec![false; total];
        let mut in_flight = FuturesUnordered::new();
        let mut batch = Batch::new();
        let mut fatal: Option<X::Error> = None;
        let mut late_failures = 0usize;

        loop {
            while fatal.is_none()
                && !cancel.is_cancelled()
                && in_flight.len() < self.config.concurrency
            {
                let Some((index, unit)) = queue.pop_front() else {
                    break;
                };
                match pool.submit(unit) {
                    Ok(handle) => in_flight.push(handle.map(move |c| (index, c))),
                    Err(e) => {
                        fatal = Some(e.into());
                        break;
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let wake = if batch.is_empty() {
                Wake::Finished(in_flight.next().await)
            } else {
                tokio::select! {
                    next = in_flight.next() => Wake::Finished(next),
                    _ = tokio::time::sleep_until(batch.deadline(interval)) => Wake::FlushDue,
                }
            };

            let (index, Completion { unit, outcome, skipped }) = match wake {
                Wake::Finished(Some(next)) => next,
                Wake::Finished(None) => break,
                Wake::FlushDue => {
                    batch.flush(&mut emitter, &tracker);
                    continue;
                }
            };

            if skipped {
                debug!(operation = %id, unit = %unit.id(), "unit skipped after cancellation");
                continue;
            }

            match outcome {
                Ok(output) => {
                    tracker.record_completed(&unit, output.bytes);
                    completed[index] = true;
                    batch.completed.push(CompletedUnit {
                        unit,
                        output: output.value,
                    });
                }
                Err(error) if !is_ignorable(&error) => {
                    tracker.record_failed(&unit, false);
                    if fatal.is_none() {
                        warn!(operation = %id, unit = %unit.id(), "fatal unit failure, draining");
                        fatal = Some(error);
                    } else {
                        late_failures += 1;
                        debug!(operation = %id, unit = %unit.id(), "further fatal failure while draining");
                    }
                }
                Err(error) => {
                    tracker.record_failed(&unit, true);
                    let exhausted = unit.attempt() >= self.config.max_attempts;
                    if exhausted {
                        tracker.record_abandoned(&unit);
                        abandoned[index] = true;
                        warn!(
                            operation = %id,
                            unit = %unit.id(),
                            attempts = unit.attempt(),
                            "unit abandoned after exhausting retries"
                        );
                    } else if fatal.is_none() && !cancel.is_cancelled() {
                        debug!(
                            operation = %id,
                            unit = %unit.id(),
                            attempt = unit.attempt() + 1,
                            "retrying unit"
                        );
                        queue.push_front((index, unit.next_attempt()));
                    }
                    batch.ignored.push(IgnoredFailure {
                        unit,
                        error,
                        abandoned: exhausted,
                    });
                }
            }

            if batch.is_due(interval) {
                batch.flush(&mut emitter, &tracker);
            }
        }

        batch.flush(&mut emitter, &tracker);
        pool.join().await;

        if late_failures > 0 {
            warn!(operation = %id, count = late_failures, "fatal failures after the first were dropped");
        }

        let watcher = tracker.snapshot();
        if let Some(cause) = fatal {
            info!(operation = %id, "transfer failed");
            return emitter.emit(EventKind::Error(cause), watcher);
        }

        if cancel.is_cancelled() {
            let incomplete: Vec<TransferUnit> = units
                .iter()
                .zip(&completed)
                .filter(|(_, done)| !**done)
                .map(|(unit, _)| unit.clone())
                .collect();
            if !incomplete.is_empty() {
                info!(operation = %id, incomplete = incomplete.len(), "transfer cancelled");
                return emitter.emit(EventKind::Cancelled(incomplete), watcher);
            }
        }

        let abandoned: Vec<TransferUnit> = units
            .into_iter()
            .zip(abandoned)
            .filter_map(|(unit, gave_up)| gave_up.then_some(unit))
            .collect();
        info!(
            operation = %id,
            completed = watcher.units_completed,
            abandoned = abandoned.len(),
            "transfer completed"
        );
        emitter.emit(EventKind::Completed { abandoned }, watcher)
    }
}
