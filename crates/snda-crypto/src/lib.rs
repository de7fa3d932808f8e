//! Hashing primitives used for request signing and payload integrity

pub mod hash;

pub use hash::*;
