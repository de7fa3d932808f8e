//! Request authentication for the storage client
//!
//! Requests are signed with AWS Signature Version 4, either in the
//! `Authorization` header ([`RequestSigner`]) or in the query string of a
//! pre-signed URL ([`generate_presigned_url`]).

pub mod credentials;
pub mod presigned;
pub mod signature;

pub use credentials::Credentials;
pub use presigned::{generate_presigned_url, PresignedMethod, PresignedUrl};
pub use signature::{uri_encode, RequestSigner, SignatureV4};
