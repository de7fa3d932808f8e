//! Events emitted over the lifetime of an operation
//!
//! Every operation produces exactly one [`EventKind::Started`], any number of
//! [`EventKind::InProgress`] / [`EventKind::IgnoredErrors`] events, and then
//! exactly one terminal event: [`EventKind::Completed`],
//! [`EventKind::Cancelled`] or [`EventKind::Error`].
//!
//! Payload accessors such as [`TransferEvent::completed_units`] panic when
//! called on an event of the wrong code. Use [`TransferEvent::kind`] or the
//! `try_*` accessors to inspect an event without that precondition.

use std::fmt;

use crate::tracker::ThreadWatcher;
use crate::unit::TransferUnit;

/// Opaque token shared by every event of one operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    Started,
    InProgress,
    IgnoredErrors,
    Cancelled,
    Completed,
    Error,
}

impl EventCode {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventCode::Cancelled | EventCode::Completed | EventCode::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Started => "STARTED",
            EventCode::InProgress => "IN_PROGRESS",
            EventCode::IgnoredErrors => "IGNORED_ERRORS",
            EventCode::Cancelled => "CANCELLED",
            EventCode::Completed => "COMPLETED",
            EventCode::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit that finished, with what its executor returned
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedUnit<O> {
    pub unit: TransferUnit,
    pub output: O,
}

/// A non-fatal failure of one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct IgnoredFailure<E> {
    pub unit: TransferUnit,
    pub error: E,
    /// Whether the unit was given up on after this failure
    pub abandoned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind<O, E> {
    Started,
    /// Units completed since the previous progress event
    InProgress(Vec<CompletedUnit<O>>),
    /// Failures observed since the previous ignored-errors event
    IgnoredErrors(Vec<IgnoredFailure<E>>),
    /// Units never completed, in enumeration order
    Cancelled(Vec<TransferUnit>),
    /// Units abandoned after exhausting their retries
    Completed { abandoned: Vec<TransferUnit> },
    /// The fatal failure that ended the operation
    Error(E),
}

impl<O, E> EventKind<O, E> {
    pub fn code(&self) -> EventCode {
        match self {
            EventKind::Started => EventCode::Started,
            EventKind::InProgress(_) => EventCode::InProgress,
            EventKind::IgnoredErrors(_) => EventCode::IgnoredErrors,
            EventKind::Cancelled(_) => EventCode::Cancelled,
            EventKind::Completed { .. } => EventCode::Completed,
            EventKind::Error(_) => EventCode::Error,
        }
    }
}

/// Immutable record of one lifecycle transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent<O, E> {
    operation_id: OperationId,
    watcher: ThreadWatcher,
    kind: EventKind<O, E>,
}

impl<O, E> TransferEvent<O, E> {
    pub fn new(operation_id: OperationId, watcher: ThreadWatcher, kind: EventKind<O, E>) -> Self {
        Self {
            operation_id,
            watcher,
            kind,
        }
    }

    pub fn code(&self) -> EventCode {
        self.kind.code()
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    pub fn watcher(&self) -> &ThreadWatcher {
        &self.watcher
    }

    pub fn kind(&self) -> &EventKind<O, E> {
        &self.kind
    }

    pub fn into_kind(self) -> EventKind<O, E> {
        self.kind
    }

    pub fn is_terminal(&self) -> bool {
        self.code().is_terminal()
    }

    pub fn try_completed_units(&self) -> Option<&[CompletedUnit<O>]> {
        match &self.kind {
            EventKind::InProgress(units) => Some(units),
            _ => None,
        }
    }

    pub fn try_cancelled_units(&self) -> Option<&[TransferUnit]> {
        match &self.kind {
            EventKind::Cancelled(units) => Some(units),
            _ => None,
        }
    }

    pub fn try_ignored_errors(&self) -> Option<&[IgnoredFailure<E>]> {
        match &self.kind {
            EventKind::IgnoredErrors(failures) => Some(failures),
            _ => None,
        }
    }

    pub fn try_abandoned_units(&self) -> Option<&[TransferUnit]> {
        match &self.kind {
            EventKind::Completed { abandoned } => Some(abandoned),
            _ => None,
        }
    }

    pub fn try_error_cause(&self) -> Option<&E> {
        match &self.kind {
            EventKind::Error(cause) => Some(cause),
            _ => None,
        }
    }

    /// Units completed since the previous progress event.
    ///
    /// # Panics
    /// Only `IN_PROGRESS` events carry completed units.
    #[track_caller]
    pub fn completed_units(&self) -> &[CompletedUnit<O>] {
        self.try_completed_units()
            .unwrap_or_else(|| self.wrong_payload("completed units", EventCode::InProgress))
    }

    /// Units that were not completed before the operation was cancelled.
    ///
    /// # Panics
    /// Only `CANCELLED` events carry cancelled units.
    #[track_caller]
    pub fn cancelled_units(&self) -> &[TransferUnit] {
        self.try_cancelled_units()
            .unwrap_or_else(|| self.wrong_payload("cancelled units", EventCode::Cancelled))
    }

    /// # Panics
    /// Only `IGNORED_ERRORS` events carry ignored errors.
    #[track_caller]
    pub fn ignored_errors(&self) -> &[IgnoredFailure<E>] {
        self.try_ignored_errors()
            .unwrap_or_else(|| self.wrong_payload("ignored errors", EventCode::IgnoredErrors))
    }

    /// # Panics
    /// Only `COMPLETED` events carry abandoned units.
    #[track_caller]
    pub fn abandoned_units(&self) -> &[TransferUnit] {
        self.try_abandoned_units()
            .unwrap_or_else(|| self.wrong_payload("abandoned units", EventCode::Completed))
    }

    /// # Panics
    /// Only `ERROR` events carry a cause.
    #[track_caller]
    pub fn error_cause(&self) -> &E {
        self.try_error_cause()
            .unwrap_or_else(|| self.wrong_payload("the error cause", EventCode::Error))
    }

    #[track_caller]
    fn wrong_payload(&self, what: &str, expected: EventCode) -> ! {
        panic!(
            "{} are only available from {} events, this is a {} event",
            what,
            expected,
            self.code()
        )
    }
}
