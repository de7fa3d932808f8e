//! Synchronous event delivery
//!
//! Observers are called inline, in registration order, before the
//! coordinator moves on. An observer that blocks stalls the operation.

use std::fmt::Display;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::{EventKind, OperationId, TransferEvent};
use crate::tracker::ThreadWatcher;

/// Sink for the events of an operation
pub trait TransferObserver<O, E>: Send {
    fn on_event(&mut self, event: &TransferEvent<O, E>);
}

impl<O, E, F> TransferObserver<O, E> for F
where
    F: FnMut(&TransferEvent<O, E>) + Send,
{
    fn on_event(&mut self, event: &TransferEvent<O, E>) {
        self(event)
    }
}

/// Delivers events of one operation, in order, to every registered observer
pub struct EventEmitter<'a, O, E> {
    operation_id: OperationId,
    observers: Vec<&'a mut dyn TransferObserver<O, E>>,
    started: bool,
    terminated: bool,
    emitted: usize,
}

impl<'a, O, E> EventEmitter<'a, O, E> {
    pub fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            observers: Vec::new(),
            started: false,
            terminated: false,
            emitted: 0,
        }
    }

    pub fn register(&mut self, observer: &'a mut dyn TransferObserver<O, E>) {
        self.observers.push(observer);
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Number of events delivered so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Build an event, deliver it to every observer and hand it back.
    ///
    /// # Panics
    /// If the lifecycle order is broken: anything before `Started`, a second
    /// `Started`, or anything after a terminal event.
    #[track_caller]
    pub fn emit(&mut self, kind: EventKind<O, E>, watcher: ThreadWatcher) -> TransferEvent<O, E> {
        let code = kind.code();
        assert!(
            !self.terminated,
            "operation {} already terminated, cannot emit {}",
            self.operation_id, code
        );
        assert_eq!(
            matches!(kind, EventKind::Started),
            !self.started,
            "operation {} must emit STARTED exactly once and first, got {}",
            self.operation_id,
            code
        );

        self.started = true;
        self.terminated = code.is_terminal();
        self.emitted += 1;

        let event = TransferEvent::new(self.operation_id.clone(), watcher, kind);
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
        event
    }
}

/// Keeps a copy of every event, mostly useful in tests
#[derive(Debug, Default)]
pub struct EventCollector<O, E> {
    events: Vec<TransferEvent<O, E>>,
}

impl<O, E> EventCollector<O, E> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn events(&self) -> &[TransferEvent<O, E>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TransferEvent<O, E>> {
        self.events
    }
}

impl<O, E> TransferObserver<O, E> for EventCollector<O, E>
where
    O: Clone + Send,
    E: Clone + Send,
{
    fn on_event(&mut self, event: &TransferEvent<O, E>) {
        self.events.push(event.clone());
    }
}

/// Forwards events into an unbounded channel so a consumer on another task
/// never holds up the operation.
pub struct ChannelObserver<O, E> {
    sender: mpsc::UnboundedSender<TransferEvent<O, E>>,
}

impl<O, E> ChannelObserver<O, E> {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent<O, E>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl<O, E> TransferObserver<O, E> for ChannelObserver<O, E>
where
    O: Clone + Send,
    E: Clone + Send,
{
    fn on_event(&mut self, event: &TransferEvent<O, E>) {
        if self.sender.send(event.clone()).is_err() {
            debug!(operation = %event.operation_id(), "event receiver dropped");
        }
    }
}

/// Logs each event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl<O, E> TransferObserver<O, E> for LoggingObserver
where
    E: Display,
{
    fn on_event(&mut self, event: &TransferEvent<O, E>) {
        let op = event.operation_id();
        let w = event.watcher();
        match event.kind() {
            EventKind::Started => {
                info!(operation = %op, units = w.total_units, "transfer started")
            }
            EventKind::InProgress(units) => debug!(
                operation = %op,
                completed = units.len(),
                done = w.units_completed,
                total = w.total_units,
                bytes = w.bytes_transferred,
                "transfer progress"
            ),
            EventKind::IgnoredErrors(failures) => {
                for f in failures {
                    warn!(
                        operation = %op,
                        unit = %f.unit.id(),
                        attempt = f.unit.attempt(),
                        abandoned = f.abandoned,
                        "ignored failure: {}",
                        f.error
                    );
                }
            }
            EventKind::Cancelled(units) => {
                info!(operation = %op, incomplete = units.len(), "transfer cancelled")
            }
            EventKind::Completed { abandoned } => info!(
                operation = %op,
                completed = w.units_completed,
                abandoned = abandoned.len(),
                bytes = w.bytes_transferred,
                "transfer completed"
            ),
            EventKind::Error(cause) => warn!(operation = %op, "transfer failed: {}", cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventCode;
    use crate::tracker::ProgressTracker;

    fn watcher() -> ThreadWatcher {
        ProgressTracker::new(2, None).snapshot()
    }

    #[test]
    fn test_delivers_in_order_to_all_observers() {
        let mut first: EventCollector<u32, String> = EventCollector::new();
        let mut codes = Vec::new();
        let mut second = |e: &TransferEvent<u32, String>| codes.push(e.code());

        {
            let mut emitter = EventEmitter::new(OperationId::new("op"));
            emitter.register(&mut first);
            emitter.register(&mut second);

            emitter.emit(EventKind::Started, watcher());
            emitter.emit(EventKind::InProgress(vec![]), watcher());
            let terminal = emitter.emit(EventKind::Completed { abandoned: vec![] }, watcher());

            assert!(terminal.is_terminal());
            assert!(emitter.is_terminated());
            assert_eq!(emitter.emitted(), 3);
        }

        assert_eq!(
            codes,
            vec![EventCode::Started, EventCode::InProgress, EventCode::Completed]
        );
        assert!(first
            .events()
            .iter()
            .all(|e| e.operation_id().as_str() == "op"));
    }

    #[test]
    #[should_panic(expected = "already terminated")]
    fn test_emit_after_terminal_panics() {
        let mut emitter: EventEmitter<'_, (), String> = EventEmitter::new(OperationId::new("op"));
        emitter.emit(EventKind::Started, watcher());
        emitter.emit(EventKind::Error("boom".into()), watcher());
        emitter.emit(EventKind::InProgress(vec![]), watcher());
    }

    #[test]
    #[should_panic(expected = "STARTED exactly once")]
    fn test_progress_before_started_panics() {
        let mut emitter: EventEmitter<'_, (), String> = EventEmitter::new(OperationId::new("op"));
        emitter.emit(EventKind::InProgress(vec![]), watcher());
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (mut observer, mut rx) = ChannelObserver::<(), String>::channel();
        {
            let mut emitter = EventEmitter::new(OperationId::new("op"));
            emitter.register(&mut observer);
            emitter.emit(EventKind::Started, watcher());
            emitter.emit(EventKind::Cancelled(vec![]), watcher());
        }

        assert_eq!(rx.recv().await.unwrap().code(), EventCode::Started);
        assert_eq!(rx.recv().await.unwrap().code(), EventCode::Cancelled);
    }
}
