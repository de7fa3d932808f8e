//! SNDA Storage Core Library
//!
//! Shared types, error taxonomy, configuration and helpers used by the
//! client, the signer and the transfer engine.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{ClientConfig, TransferSettings};
pub use error::{Error, Result};

/// Client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default service endpoint
pub const DEFAULT_ENDPOINT: &str = "storage.grandcloud.cn";

/// Maximum object size (5 TiB)
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Maximum number of parts in multipart upload
pub const MAX_PARTS: u32 = 10_000;

/// Minimum part size (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum bucket name length
pub const MAX_BUCKET_NAME_LENGTH: usize = 63;

/// Minimum bucket name length
pub const MIN_BUCKET_NAME_LENGTH: usize = 3;

/// Maximum object key length
pub const MAX_KEY_LENGTH: usize = 1024;
