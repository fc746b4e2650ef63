use chrono::Duration;

use crate::item::Timestamp;

/// Errors surfaced synchronously to callers. Containers never retry, never
/// fall back to defaults, and never partially apply a bulk mutation: a
/// precondition violation fails before any mutation runs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemporalError {
    #[error("invalid range: from ({from:?}) is after to ({to:?})")]
    InvalidRange { from: Timestamp, to: Timestamp },

    #[error("invalid interval: end ({end:?}) is before start ({start:?})")]
    InvalidInterval { start: Timestamp, end: Timestamp },

    #[error("invalid bucket interval: {0:?} must be positive")]
    InvalidBucket(Duration),

    #[error("invalid construction: {0}")]
    ConstructionInvalid(&'static str),

    #[error("container is empty")]
    EmptyContainer,

    #[error("timestamp has no offset and the normalization policy requires one")]
    UnspecifiedKind,
}

pub type Result<T> = std::result::Result<T, TemporalError>;
