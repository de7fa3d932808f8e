//! Bucket types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bucket owner as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: DateTime<Utc>,
}

/// Result of a ListBuckets call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBucketsResult {
    pub owner: Owner,
    pub buckets: Vec<BucketInfo>,
}

/// Check a bucket name against the service naming rules before a request is
/// signed, so obviously bad names never reach the network.
pub fn validate_bucket_name(name: &str) -> Result<(), crate::Error> {
    if name.len() < crate::MIN_BUCKET_NAME_LENGTH {
        return Err(crate::Error::InvalidBucketName(
            "Bucket name too short (min 3 characters)".into(),
        ));
    }
    if name.len() > crate::MAX_BUCKET_NAME_LENGTH {
        return Err(crate::Error::InvalidBucketName(
            "Bucket name too long (max 63 characters)".into(),
        ));
    }

    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !edge_ok(bytes[0]) {
        return Err(crate::Error::InvalidBucketName(
            "Must start with lowercase letter or number".into(),
        ));
    }

    if !edge_ok(bytes[bytes.len() - 1]) {
        return Err(crate::Error::InvalidBucketName(
            "Must end with lowercase letter or number".into(),
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
            return Err(crate::Error::InvalidBucketName(format!(
                "Invalid character: {}",
                c
            )));
        }
    }

    if name.contains("..") {
        return Err(crate::Error::InvalidBucketName(
            "Cannot have consecutive periods".into(),
        ));
    }

    Ok(())
}
