//! Error types for the storage client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the storage service or detected locally before a
/// request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Bucket Errors
    #[error("The specified bucket does not exist")]
    NoSuchBucket,

    #[error("The requested bucket name is not available")]
    BucketAlreadyExists,

    #[error("The bucket you tried to delete is not empty")]
    BucketNotEmpty,

    // Object Errors
    #[error("The specified key does not exist")]
    NoSuchKey,

    #[error("The specified multipart upload does not exist")]
    NoSuchUpload,

    #[error("Invalid part: {0}")]
    InvalidPart(String),

    #[error("Object is too large")]
    EntityTooLarge,

    #[error("Part is smaller than the minimum allowed size")]
    EntityTooSmall,

    // Access Errors
    #[error("Access Denied")]
    AccessDenied,

    #[error("The access key ID you provided does not exist")]
    InvalidAccessKeyId,

    #[error("The request signature does not match")]
    SignatureDoesNotMatch,

    #[error("The difference between the request time and the server's time is too large")]
    RequestTimeTooSkewed,

    // Validation Errors
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed XML: {0}")]
    MalformedXML(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    // Transient service errors
    #[error("Please reduce your request rate")]
    SlowDown,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Request timeout: {0}")]
    RequestTimeout(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("{code}: {message}")]
    Other { code: String, message: String },

    // Local configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn code(&self) -> &str {
        match self {
            Error::NoSuchBucket => "NoSuchBucket",
            Error::BucketAlreadyExists => "BucketAlreadyExists",
            Error::BucketNotEmpty => "BucketNotEmpty",
            Error::NoSuchKey => "NoSuchKey",
            Error::NoSuchUpload => "NoSuchUpload",
            Error::InvalidPart(_) => "InvalidPart",
            Error::EntityTooLarge => "EntityTooLarge",
            Error::EntityTooSmall => "EntityTooSmall",
            Error::AccessDenied => "AccessDenied",
            Error::InvalidAccessKeyId => "InvalidAccessKeyId",
            Error::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Error::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Error::InvalidBucketName(_) => "InvalidBucketName",
            Error::InvalidKey(_) => "KeyTooLongError",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::MalformedXML(_) => "MalformedXML",
            Error::InvalidRange(_) => "InvalidRange",
            Error::SlowDown => "SlowDown",
            Error::ServiceUnavailable => "ServiceUnavailable",
            Error::RequestTimeout(_) => "RequestTimeout",
            Error::InternalError(_) => "InternalError",
            Error::Other { code, .. } => code,
            Error::Config(_) => "ClientConfiguration",
        }
    }

    /// Map an error document's `<Code>` back onto the taxonomy.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "NoSuchBucket" => Error::NoSuchBucket,
            "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => Error::BucketAlreadyExists,
            "BucketNotEmpty" => Error::BucketNotEmpty,
            "NoSuchKey" => Error::NoSuchKey,
            "NoSuchUpload" => Error::NoSuchUpload,
            "InvalidPart" | "InvalidPartOrder" => Error::InvalidPart(message),
            "EntityTooLarge" => Error::EntityTooLarge,
            "EntityTooSmall" => Error::EntityTooSmall,
            "AccessDenied" => Error::AccessDenied,
            "InvalidAccessKeyId" => Error::InvalidAccessKeyId,
            "SignatureDoesNotMatch" => Error::SignatureDoesNotMatch,
            "RequestTimeTooSkewed" => Error::RequestTimeTooSkewed,
            "InvalidBucketName" => Error::InvalidBucketName(message),
            "KeyTooLongError" => Error::InvalidKey(message),
            "InvalidArgument" => Error::InvalidArgument(message),
            "InvalidRequest" => Error::InvalidRequest(message),
            "MalformedXML" | "MalformedXMLDocument" => Error::MalformedXML(message),
            "InvalidRange" => Error::InvalidRange(message),
            "SlowDown" => Error::SlowDown,
            "ServiceUnavailable" => Error::ServiceUnavailable,
            "RequestTimeout" => Error::RequestTimeout(message),
            "InternalError" => Error::InternalError(message),
            _ => Error::Other {
                code: code.to_string(),
                message,
            },
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidBucketName(_)
            | Error::InvalidKey(_)
            | Error::InvalidArgument(_)
            | Error::InvalidRequest(_)
            | Error::MalformedXML(_)
            | Error::InvalidPart(_)
            | Error::EntityTooLarge
            | Error::EntityTooSmall
            | Error::RequestTimeout(_)
            | Error::Config(_) => 400,

            Error::AccessDenied
            | Error::InvalidAccessKeyId
            | Error::SignatureDoesNotMatch
            | Error::RequestTimeTooSkewed => 403,

            Error::NoSuchBucket | Error::NoSuchKey | Error::NoSuchUpload => 404,

            Error::BucketAlreadyExists | Error::BucketNotEmpty => 409,

            Error::InvalidRange(_) => 416,

            Error::SlowDown | Error::ServiceUnavailable => 503,

            Error::InternalError(_) | Error::Other { .. } => 500,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::SlowDown
                | Error::ServiceUnavailable
                | Error::RequestTimeout(_)
                | Error::InternalError(_)
        )
    }
}
