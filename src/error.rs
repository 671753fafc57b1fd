//! Error type shared by every collection in the crate.

use thiserror::Error;

/// The error type returned by fallible operations on the collections in this crate.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// An argument was outside of the range of values accepted by the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A bit index was at or past the end of a `BitField`.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The length of the collection that was indexed.
        len: usize,
    },
    /// Two collections with different shapes were combined.
    #[error("incompatible shape: {0}")]
    IncompatibleShape(String),
    /// A `DoubleHashMap` had no free slot within the probe window of a key.
    #[error("no free slot within {0} probes")]
    CapacityExceeded(usize),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn incompatible_shape(msg: impl Into<String>) -> Self {
        Error::IncompatibleShape(msg.into())
    }
}

/// A specialized `Result` type for collection operations.
pub type Result<T> = std::result::Result<T, Error>;
