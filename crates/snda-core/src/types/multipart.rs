//! Multipart upload types and part planning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ByteRange;

/// An initiated multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<DateTime<Utc>>,
}

impl MultipartUpload {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            initiated: None,
        }
    }
}

/// Part number and ETag returned by UploadPart, echoed back on completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartETag {
    pub part_number: u32,
    pub etag: String,
}

/// Result of CompleteMultipartUpload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartCompleted {
    pub location: Option<String>,
    pub bucket: String,
    pub key: String,
    pub etag: String,
}

/// One planned part of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRange {
    pub part_number: u32,
    pub range: ByteRange,
}

/// Effective part size for an object: at least `MIN_PART_SIZE`, and large
/// enough that the object fits in `MAX_PARTS` parts.
pub fn effective_part_size(object_size: u64, preferred: u64) -> u64 {
    let floor_for_count = object_size.div_ceil(u64::from(crate::MAX_PARTS));
    preferred
        .max(crate::MIN_PART_SIZE)
        .max(floor_for_count)
        .min(crate::MAX_PART_SIZE)
}

/// Split an object into consecutive parts numbered from 1.
pub fn plan_parts(object_size: u64, preferred_part_size: u64) -> Result<Vec<PartRange>, crate::Error> {
    if object_size > crate::MAX_OBJECT_SIZE {
        return Err(crate::Error::EntityTooLarge);
    }

    let part_size = effective_part_size(object_size, preferred_part_size);
    let mut parts = Vec::new();
    let mut offset = 0u64;
    let mut part_number = 1u32;

    while offset < object_size {
        let length = part_size.min(object_size - offset);
        parts.push(PartRange {
            part_number,
            range: ByteRange::new(offset, length),
        });
        offset += length;
        part_number += 1;
    }

    Ok(parts)
}
