//! Core types for the storage client

mod bucket;
mod multipart;
mod object;

pub use bucket::*;
pub use multipart::*;
pub use object::*;
