//! Error types for bitmap decoding and buffer pooling.

use thiserror::Error;

/// Error variants for roaring bitmap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The input ended before a complete bitmap was read.
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    /// The leading cookie matches no known serialization layout.
    #[error("invalid cookie: {0:#010x}")]
    InvalidCookie(u32),

    /// The header declares more containers than there are 16-bit keys.
    #[error("invalid container count: {0}")]
    InvalidContainerCount(u32),

    /// A container key was not strictly greater than its predecessor.
    #[error("container keys out of order at index {index}: {key} after {previous}")]
    UnorderedKeys {
        /// Position of the offending key in the header.
        index: usize,
        /// The preceding key.
        previous: u16,
        /// The offending key.
        key: u16,
    },

    /// A container payload disagrees with the cardinality stored in the header.
    #[error("cardinality mismatch for key {key}: header says {expected}, payload holds {actual}")]
    CardinalityMismatch {
        /// Key of the container.
        key: u16,
        /// Cardinality declared in the header.
        expected: u32,
        /// Cardinality found in the payload.
        actual: u32,
    },

    /// A sparse or run payload is not strictly ascending.
    #[error("container for key {0} is not strictly ascending")]
    UnsortedContainer(u16),

    /// An offset header entry does not point at the payload that follows.
    #[error("offset mismatch for container {index}: header says {expected}, payload at {actual}")]
    OffsetMismatch {
        /// Container index.
        index: usize,
        /// Offset recorded in the header.
        expected: u32,
        /// Actual stream position of the payload.
        actual: u64,
    },

    /// Bytes remained after a complete bitmap was decoded.
    #[error("{0} trailing bytes after bitmap")]
    TrailingBytes(usize),

    /// Every block of the pool is currently rented.
    #[error("buffer pool exhausted: all {capacity} blocks in use")]
    PoolExhausted {
        /// Number of blocks the pool owns.
        capacity: usize,
    },

    /// A block was handed back to a pool that did not issue it.
    #[error("block was not issued by this pool")]
    ForeignBuffer,

    /// An I/O error occurred during serialization or deserialization.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Return true for errors caused by malformed serialized input.
    pub fn is_format(&self) -> bool {
        !matches!(
            self,
            Error::PoolExhausted { .. } | Error::ForeignBuffer | Error::Io(_)
        )
    }
}

/// A specialized Result type for roaring bitmap operations.
pub type Result<T> = std::result::Result<T, Error>;
