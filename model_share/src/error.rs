//! Error types for model persistence and sharing operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting, transmitting or materializing models
#[derive(Error, Debug)]
pub enum ShareError {
    /// Shared-memory segments are not available on this platform
    #[error("shared memory is not available on this platform")]
    ShmUnavailable,

    /// Shared-memory segment not found in this process
    #[error("shared memory segment not found: {name}")]
    SegmentNotFound {
        /// Segment name
        name: String,
    },

    /// Shared-memory segment is smaller than its recorded descriptor
    #[error("segment {name} holds {actual} bytes, descriptor records {expected}")]
    SegmentTruncated {
        /// Segment name
        name: String,
        /// Byte length recorded in the descriptor
        expected: usize,
        /// Byte length actually mapped
        actual: usize,
    },

    /// Persisted artifact file is missing
    #[error("persisted artifact not found: {}", path.display())]
    ArtifactNotFound {
        /// Artifact path
        path: PathBuf,
    },

    /// Persisted artifact failed structural validation
    #[error("corrupt persisted artifact {}: {reason}", path.display())]
    CorruptArtifact {
        /// Artifact path
        path: PathBuf,
        /// What failed to validate
        reason: String,
    },

    /// Out-of-band buffer count diverged between serialization and reconstruction
    #[error("out-of-band buffer mismatch: {recorded} recorded, {consumed} consumed")]
    BufferMismatch {
        /// Descriptors recorded during serialization
        recorded: usize,
        /// Buffers consumed during reconstruction
        consumed: usize,
    },

    /// Out-of-band buffer has an unexpected byte length
    #[error("out-of-band buffer has {actual} bytes, expected {expected}")]
    BufferSize {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        actual: usize,
    },

    /// Model key is unknown to this store client
    #[error("unknown model key: {key}")]
    UnknownKey {
        /// Display form of the key
        key: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("system call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// Skeleton serialization/deserialization error
    #[error("skeleton encoding error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for model persistence and sharing operations
pub type ShareResult<T> = Result<T, ShareError>;
