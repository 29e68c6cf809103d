//! Structural invariant violations reported by `verify()`.
//!
//! Allocation failures are [`cairn_memory::MemoryError`]; this type only
//! describes a container whose internal shape is broken, which indicates an
//! inconsistent comparator/hash or a bug.

use thiserror::Error;

/// A broken red-black tree or hash table invariant
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("header sentinel is not red")]
    HeaderNotRed,

    #[error("root node is red")]
    RedRoot,

    #[error("red node has a red child")]
    RedRed,

    #[error("black height {found} differs from {expected}")]
    BlackHeight { expected: usize, found: usize },

    #[error("keys are out of order")]
    OutOfOrder,

    #[error("child does not point back to its parent")]
    BrokenParentLink,

    #[error("cached leftmost node is stale")]
    StaleLeftmost,

    #[error("cached rightmost node is stale")]
    StaleRightmost,

    #[error("recorded length {recorded} but found {counted} elements")]
    LengthMismatch { recorded: usize, counted: usize },

    #[error("bucket count {0} is not in the prime table")]
    BucketCountNotPrime(usize),

    #[error("node in bucket {found} hashes to bucket {expected}")]
    MisplacedNode { found: usize, expected: usize },

    #[error("equal keys are split into several runs in bucket {bucket}")]
    ScatteredDuplicates { bucket: usize },
}

impl InvariantViolation {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::HeaderNotRed
            | Self::RedRoot
            | Self::RedRed
            | Self::BlackHeight { .. }
            | Self::OutOfOrder
            | Self::BrokenParentLink
            | Self::StaleLeftmost
            | Self::StaleRightmost => "COLL:TREE:INVARIANT",
            Self::LengthMismatch { .. } => "COLL:LENGTH",
            Self::BucketCountNotPrime(_)
            | Self::MisplacedNode { .. }
            | Self::ScatteredDuplicates { .. } => "COLL:HASH:INVARIANT",
        }
    }
}
