//! Storage client for SNDA storage
//!
//! [`StorageService`] issues one signed request per call. [`ThreadedService`]
//! splits object uploads and downloads into parts and runs them through the
//! transfer engine, reporting progress to a
//! [`TransferObserver`](snda_transfer::TransferObserver).
//!
//! ```text
//!   ThreadedService ──► TransferCoordinator ──► WorkerPool ──► UnitExecutor
//!                                                                  │
//!   StorageService ◄───────────────────────────────────────────────┘
//!         │
//!         ▼
//!   Transport (HttpTransport: reqwest + SigV4 + rate limit)
//! ```

pub mod error;
pub mod limiter;
pub mod request;
pub mod service;
pub mod threaded;
pub mod transport;
pub mod xml;

#[cfg(test)]
mod mock;

pub use error::{ClientError, ClientResult};
pub use limiter::BandwidthLimiter;
pub use request::{StorageRequest, StorageResponse};
pub use service::{GetObjectOutput, ListObjectsOptions, StorageService};
pub use threaded::{
    PartDownloader, PartSource, PartUploader, ThreadedService, TransferOutcome, UploadAborter,
    UploadFinisher,
};
pub use transport::{HttpTransport, Transport};
