//! Transfer units: the indivisible pieces of a multipart operation

use std::fmt;

/// Identity of a unit within its operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitId {
    /// Part number of an object (1-based)
    Part(u32),
    /// Multipart upload id, for whole-upload operations
    Upload(String),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Part(n) => write!(f, "part-{}", n),
            UnitId::Upload(id) => write!(f, "upload-{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    UploadPart,
    DownloadPart,
    Complete,
    Abort,
}

/// What a unit operates on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitPayload {
    /// Inclusive byte range of the object
    Range { start: u64, end: u64 },
    /// An existing multipart upload
    Upload {
        bucket: String,
        key: String,
        upload_id: String,
    },
}

impl UnitPayload {
    /// Number of bytes the unit moves, zero for control calls
    pub fn byte_len(&self) -> u64 {
        match self {
            UnitPayload::Range { start, end } => end - start + 1,
            UnitPayload::Upload { .. } => 0,
        }
    }
}

/// One indivisible transfer. Retrying produces a copy with a higher
/// attempt number and the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferUnit {
    id: UnitId,
    kind: UnitKind,
    payload: UnitPayload,
    attempt: u32,
}

impl TransferUnit {
    pub fn new(id: UnitId, kind: UnitKind, payload: UnitPayload) -> Self {
        Self {
            id,
            kind,
            payload,
            attempt: 1,
        }
    }

    pub fn upload_part(part_number: u32, start: u64, end: u64) -> Self {
        Self::new(
            UnitId::Part(part_number),
            UnitKind::UploadPart,
            UnitPayload::Range { start, end },
        )
    }

    pub fn download_part(part_number: u32, start: u64, end: u64) -> Self {
        Self::new(
            UnitId::Part(part_number),
            UnitKind::DownloadPart,
            UnitPayload::Range { start, end },
        )
    }

    pub fn complete(bucket: &str, key: &str, upload_id: &str) -> Self {
        Self::whole_upload(UnitKind::Complete, bucket, key, upload_id)
    }

    pub fn abort(bucket: &str, key: &str, upload_id: &str) -> Self {
        Self::whole_upload(UnitKind::Abort, bucket, key, upload_id)
    }

    fn whole_upload(kind: UnitKind, bucket: &str, key: &str, upload_id: &str) -> Self {
        Self::new(
            UnitId::Upload(upload_id.to_string()),
            kind,
            UnitPayload::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
            },
        )
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn payload(&self) -> &UnitPayload {
        &self.payload
    }

    /// 1 for the first execution
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Whether `other` is the same unit, regardless of attempt
    pub fn same_unit(&self, other: &TransferUnit) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}
