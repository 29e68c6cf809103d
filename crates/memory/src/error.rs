//! Standalone error types for cairn-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! The pool never fails on its own: every `OutOfMemory` originates in the
//! backing allocator and travels unchanged through the containers to the
//! caller. A missing key is never an error.

use core::alloc::Layout;
use thiserror::Error;

// ============================================================================
// Main Error Types
// ============================================================================

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The backing allocator could not satisfy a request.
    #[error("out of memory: {size} bytes with {align} byte alignment")]
    OutOfMemory { size: usize, align: usize },

    /// A size computation overflowed or produced a layout the platform rejects.
    #[error("invalid memory layout: {reason}")]
    InvalidLayout { reason: String },

    /// A pool configuration failed validation.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl MemoryError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "MEM:ALLOC:OOM",
            Self::InvalidLayout { .. } => "MEM:ALLOC:LAYOUT",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
        }
    }

    /// Check if this error came from an exhausted backing allocator
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create out of memory error
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        tracing::error!(size, align, "backing allocator exhausted");
        Self::OutOfMemory { size, align }
    }

    /// Create out of memory error from layout
    pub fn out_of_memory_with_layout(layout: Layout) -> Self {
        Self::out_of_memory(layout.size(), layout.align())
    }

    /// Create invalid layout error
    pub fn invalid_layout(reason: &str) -> Self {
        Self::InvalidLayout {
            reason: reason.to_string(),
        }
    }

    /// Create invalid configuration error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// The layout to report to `handle_alloc_error`, if this error carries one.
    #[must_use]
    pub fn layout(&self) -> Option<Layout> {
        match self {
            Self::OutOfMemory { size, align } => Layout::from_size_align(*size, *align).ok(),
            Self::InvalidLayout { .. } | Self::InvalidConfig { .. } => None,
        }
    }
}

/// Diverges on an allocation failure raised inside an infallible trait method
/// (`Clone`, `Extend`, `FromIterator`).
///
/// Out-of-memory goes to [`std::alloc::handle_alloc_error`], matching the
/// behaviour of the standard collections; a layout overflow panics the way
/// `Vec` does on capacity overflow.
#[cold]
pub fn handle_alloc_failure(err: MemoryError) -> ! {
    match err.layout() {
        Some(layout) => std::alloc::handle_alloc_error(layout),
        None => panic!("{err}"),
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Generic result type alias
pub type Result<T> = MemoryResult<T>;

/// Type aliases used throughout the allocator module
pub type AllocError = MemoryError;
pub type AllocResult<T> = MemoryResult<T>;

// ============================================================================
// Tests
// ============================================================================
