//! Unified error handling for WarpForge
//!
//! Every entry operation validates its operands before anything is launched,
//! so the variants below are the complete set of caller-visible failures:
//! - User errors (bad shapes, dtypes, layouts, configuration)
//! - Backend errors (stream/thread-pool setup)
//! - Internal errors (bugs)
//!
//! Numerically degenerate rows are deliberately *not* errors.

use std::fmt;

use crate::backend::Device;
use crate::tensor::DType;

/// Unified error type for WarpForge
#[derive(Debug, thiserror::Error)]
pub enum WarpForgeError {
    // ========== Operand Errors ==========
    /// Storage type outside the closed set the kernels are instantiated for
    #[error("unsupported numeric type: {0}")]
    UnsupportedDType(DType),

    /// Operands of one call disagree on storage type
    #[error("dtype mismatch for {name}: expected {expected}, got {actual}")]
    DTypeMismatch {
        name: String,
        expected: DType,
        actual: DType,
    },

    /// Operand is a strided view rather than a dense row-major buffer
    #[error("tensor {0} is not contiguous")]
    NonContiguousTensor(String),

    /// Operand lives on a different device than the launching stream
    #[error("tensor {name} is on {actual}, stream is on {expected}")]
    DeviceMismatch {
        name: String,
        expected: Device,
        actual: Device,
    },

    /// Invalid tensor shape
    #[error("Invalid tensor shape: {0}")]
    InvalidTensorShape(String),

    /// Mask or bias cannot be broadcast onto the logits
    #[error("Broadcast shape mismatch: {0}")]
    BroadcastShapeMismatch(String),

    /// Row is wider than the per-lane register buffer can hold
    #[error("row width {cols} exceeds the supported maximum of {max} columns")]
    ColumnsExceedCapacity { cols: usize, max: usize },

    /// Flat buffer handed to a kernel has the wrong length
    #[error("buffer {name} has {actual} elements, expected {expected}")]
    BufferLengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    // ========== Configuration / Backend Errors ==========
    /// Invalid stream or logging configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Stream thread pool could not be created
    #[error("Backend initialization failed: {0}")]
    BackendInitializationFailed(String),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WarpForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            WarpForgeError::UnsupportedDType(_)
            | WarpForgeError::DTypeMismatch { .. }
            | WarpForgeError::NonContiguousTensor(_)
            | WarpForgeError::DeviceMismatch { .. }
            | WarpForgeError::InvalidTensorShape(_)
            | WarpForgeError::BroadcastShapeMismatch(_)
            | WarpForgeError::ColumnsExceedCapacity { .. }
            | WarpForgeError::BufferLengthMismatch { .. }
            | WarpForgeError::InvalidConfiguration(_) => ErrorCategory::User,

            WarpForgeError::BackendInitializationFailed(_) => ErrorCategory::Backend,

            WarpForgeError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this is a user-facing error (actionable by users)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
///
/// - User: fix the operands or configuration
/// - Backend: the execution context could not be set up
/// - Internal: report as bug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User error - invalid input or configuration
    User,
    /// Backend error - execution context failure
    Backend,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

// Helper type alias for Results using WarpForgeError
pub type ForgeResult<T> = std::result::Result<T, WarpForgeError>;
