//! Concurrent multipart transfer engine
//!
//! A transfer is described as an [`Operation`]: a fixed list of
//! [`TransferUnit`]s such as the parts of an object. The
//! [`TransferCoordinator`] runs the units on a bounded [`WorkerPool`],
//! retries ignorable failures and reports the lifecycle through
//! [`TransferEvent`]s delivered to a [`TransferObserver`]:
//!
//! ```text
//! STARTED -> (IN_PROGRESS | IGNORED_ERRORS)* -> COMPLETED | CANCELLED | ERROR
//! ```
//!
//! The engine knows nothing about HTTP. The work of a unit is supplied by a
//! [`UnitExecutor`].

pub mod coordinator;
pub mod emitter;
pub mod error;
pub mod event;
pub mod pool;
pub mod tracker;
pub mod unit;

pub use coordinator::{CancelHandle, Operation, TransferConfig, TransferCoordinator};
pub use emitter::{ChannelObserver, EventCollector, EventEmitter, LoggingObserver, TransferObserver};
pub use error::{ConfigError, PoolError, PoolResult};
pub use event::{CompletedUnit, EventCode, EventKind, IgnoredFailure, OperationId, TransferEvent};
pub use pool::{Completion, UnitExecutor, UnitHandle, UnitOutput, WorkerPool};
pub use tracker::{ProgressTracker, ThreadWatcher};
pub use unit::{TransferUnit, UnitId, UnitKind, UnitPayload};
