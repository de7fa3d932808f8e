//! Bounded worker pool
//!
//! A fixed number of worker tasks pull units from a shared queue, so
//! submissions beyond the pool size wait in the queue instead of spawning
//! more work. Each submission returns a [`UnitHandle`] future that resolves
//! with the unit and its outcome.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{PoolError, PoolResult};
use crate::tracker::ProgressTracker;
use crate::unit::TransferUnit;

/// What a successful unit produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutput<O> {
    pub value: O,
    /// Payload bytes moved by the unit
    pub bytes: u64,
}

impl<O> UnitOutput<O> {
    pub fn new(value: O, bytes: u64) -> Self {
        Self { value, bytes }
    }
}

/// Performs the actual work of a unit, typically one signed HTTP request
#[async_trait]
pub trait UnitExecutor: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: From<PoolError> + Send + 'static;

    async fn execute(&self, unit: &TransferUnit) -> Result<UnitOutput<Self::Output>, Self::Error>;
}

/// A unit together with the outcome of its execution
#[derive(Debug)]
pub struct Completion<O, E> {
    pub unit: TransferUnit,
    pub outcome: Result<UnitOutput<O>, E>,
    /// The unit never ran because its operation was cancelled first.
    /// `outcome` then holds [`PoolError::Skipped`].
    pub skipped: bool,
}

impl<O, E: From<PoolError>> Completion<O, E> {
    fn skipped(unit: TransferUnit) -> Self {
        let outcome = Err(PoolError::Skipped(unit.id().to_string()).into());
        Self {
            unit,
            outcome,
            skipped: true,
        }
    }
}

struct Job<O, E> {
    unit: TransferUnit,
    reply: oneshot::Sender<Completion<O, E>>,
}

/// Resolves once the submitted unit has run
pub struct UnitHandle<O, E> {
    unit: TransferUnit,
    receiver: oneshot::Receiver<Completion<O, E>>,
}

impl<O, E: From<PoolError>> Future for UnitHandle<O, E> {
    type Output = Completion<O, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(completion)) => Poll::Ready(completion),
            Poll::Ready(Err(_)) => Poll::Ready(Completion {
                unit: self.unit.clone(),
                outcome: Err(PoolError::WorkerLost(self.unit.id().to_string()).into()),
                skipped: false,
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Delay before the given attempt: nothing for the first, then
/// `base * 2^(attempt - 2)` capped at 32x the base.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    if attempt <= 1 || base.is_zero() {
        return Duration::ZERO;
    }
    base * 2u32.pow((attempt - 2).min(5))
}

pub struct WorkerPool<X: UnitExecutor> {
    sender: Option<mpsc::UnboundedSender<Job<X::Output, X::Error>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<X: UnitExecutor> WorkerPool<X> {
    /// Start `size` workers (at least one) sharing `executor` and `tracker`.
    /// Once `cancel` fires, units that have not started executing are
    /// answered with a skipped [`Completion`] instead of running.
    pub fn new(
        size: usize,
        executor: Arc<X>,
        tracker: Arc<ProgressTracker>,
        retry_base_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .map(|worker_id| {
                tokio::spawn(Self::worker_loop(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&executor),
                    Arc::clone(&tracker),
                    retry_base_delay,
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.is_none()
    }

    /// Queue a unit for execution.
    pub fn submit(&self, unit: TransferUnit) -> PoolResult<UnitHandle<X::Output, X::Error>> {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        let (reply, receiver) = oneshot::channel();

        sender
            .send(Job {
                unit: unit.clone(),
                reply,
            })
            .map_err(|_| PoolError::ShutDown)?;

        Ok(UnitHandle { unit, receiver })
    }

    /// Stop accepting units. Units already queued or running still finish.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_some() {
            debug!(workers = self.workers.len(), "worker pool shutting down");
        }
    }

    /// Shut down and wait for every worker to exit.
    pub async fn join(mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                error!("worker task failed: {}", e);
            }
        }
    }

    async fn worker_loop(
        worker_id: usize,
        receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job<X::Output, X::Error>>>>,
        executor: Arc<X>,
        tracker: Arc<ProgressTracker>,
        retry_base_delay: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            let job = receiver.lock().await.recv().await;
            let Some(Job { unit, reply }) = job else {
                break;
            };

            if reply.is_closed() {
                debug!(worker_id, unit = %unit.id(), "result no longer wanted, skipping");
                continue;
            }

            let delay = retry_delay(retry_base_delay, unit.attempt());
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }

            if cancel.is_cancelled() {
                debug!(worker_id, unit = %unit.id(), "operation cancelled, not starting unit");
                let _ = reply.send(Completion::skipped(unit));
                continue;
            }

            tracker.record_dispatched(&unit);
            let outcome = AssertUnwindSafe(executor.execute(&unit))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!(worker_id, unit = %unit.id(), "executor panicked");
                    Err(PoolError::ExecutorPanicked(unit.id().to_string()).into())
                });

            // The coordinator may have stopped listening; nothing to do then.
            let _ = reply.send(Completion {
                unit,
                outcome,
                skipped: false,
            });
        }

        debug!(worker_id, "worker exiting");
    }
}

impl<X: UnitExecutor> Drop for WorkerPool<X> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
