//! Client error types

use std::io;

use snda_transfer::PoolError;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client-side errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The service answered with an error document
    #[error("{error} (HTTP {status})")]
    Service {
        status: u16,
        error: snda_core::Error,
        request_id: Option<String>,
    },

    /// Rejected locally before any request was sent
    #[error(transparent)]
    Invalid(#[from] snda_core::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("IO error: {message}")]
    Io { kind: io::ErrorKind, message: String },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Parts abandoned after exhausting retries: {0:?}")]
    PartsAbandoned(Vec<u32>),
}

impl ClientError {
    /// The default ignorable-failure predicate: retrying may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout(_) => true,
            ClientError::Service { status, error, .. } => {
                *status >= 500 || *status == 429 || error.is_transient()
            }
            ClientError::Io { kind, .. } => matches!(
                kind,
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            ClientError::Invalid(_)
            | ClientError::Decode(_)
            | ClientError::Pool(_)
            | ClientError::PartsAbandoned(_) => false,
        }
    }

    /// Service error code, if the service answered
    pub fn service_code(&self) -> Option<&str> {
        match self {
            ClientError::Service { error, .. } => Some(error.code()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<quick_xml::DeError> for ClientError {
    fn from(e: quick_xml::DeError) -> Self {
        ClientError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status: u16, error: snda_core::Error) -> ClientError {
        ClientError::Service {
            status,
            error,
            request_id: None,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Transport("connection refused".into()).is_transient());
        assert!(ClientError::Timeout("60s".into()).is_transient());
        assert!(service(503, snda_core::Error::SlowDown).is_transient());
        assert!(service(500, snda_core::Error::InternalError("x".into())).is_transient());

        assert!(!service(403, snda_core::Error::AccessDenied).is_transient());
        assert!(!service(404, snda_core::Error::NoSuchUpload).is_transient());
        assert!(!ClientError::Decode("bad xml".into()).is_transient());
        assert!(!ClientError::from(PoolError::ShutDown).is_transient());
    }

    #[test]
    fn test_io_errors_keep_kind() {
        let err = ClientError::from(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert!(err.is_transient());
        let err = ClientError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_service_code() {
        let err = service(404, snda_core::Error::NoSuchKey);
        assert_eq!(err.service_code(), Some("NoSuchKey"));
        assert_eq!(err.status(), Some(404));
        assert_eq!(ClientError::Transport("x".into()).service_code(), None);
    }
}
