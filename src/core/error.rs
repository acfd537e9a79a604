//! Error types for BedLens
//!
//! Defines all error types used throughout the library.

use thiserror::Error;

/// Main error type for BedLens operations
#[derive(Debug, Error)]
pub enum BedLensError {
    /// Region file decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Region set construction errors
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// Errors loading analysis reference inputs
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Errors from the persistent view coordinator
    #[error("View error: {0}")]
    View(#[from] ViewError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while decoding an uploaded region file
///
/// Decode errors are user-actionable: the file has to be fixed or replaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Line has fewer than the three required fields
    #[error("Malformed line {line}: expected at least 3 fields, found {found}")]
    TooFewFields { line: usize, found: usize },

    /// Start or end field is not an unsigned integer
    #[error("Malformed line {line}: invalid {field} coordinate '{value}'")]
    InvalidCoordinate {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// Input is not UTF-8 text
    #[error("Unsupported encoding{}: {reason}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    UnsupportedEncoding { line: Option<usize>, reason: String },

    /// No region lines in the input
    #[error("File contains no regions")]
    Empty,

    /// Underlying read failure
    #[error("I/O error while reading: {0}")]
    Io(String),

    /// Decoding stopped because the owning generation was superseded
    #[error("Decoding cancelled")]
    Cancelled,
}

impl DecodeError {
    /// Line number the error refers to, if any (1-based)
    pub fn line_number(&self) -> Option<usize> {
        match self {
            DecodeError::TooFewFields { line, .. } => Some(*line),
            DecodeError::InvalidCoordinate { line, .. } => Some(*line),
            DecodeError::UnsupportedEncoding { line, .. } => *line,
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(e.to_string())
    }
}

/// Errors that can occur while building a region set
///
/// These are internal resource problems and are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// Sequence exceeds the configured region capacity
    #[error("Region set capacity exceeded: {requested} regions requested, limit is {limit}")]
    CapacityExceeded { requested: usize, limit: usize },
}

/// A single analysis phase failure
///
/// Never fatal on its own; the matching result field is left unset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Phase '{phase}' failed: {reason}")]
pub struct PhaseError {
    pub phase: &'static str,
    pub reason: String,
}

impl PhaseError {
    pub fn new(phase: &'static str, reason: impl Into<String>) -> Self {
        Self {
            phase,
            reason: reason.into(),
        }
    }
}

/// Errors from using a lent region-set reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The owner has released the region set
    #[error("Region set {0} has been released")]
    Released(u64),
}

/// Errors loading analysis context inputs (reference, TSS, annotations)
#[derive(Debug, Error)]
pub enum ContextError {
    /// Malformed line in a context file
    #[error("Invalid {kind} file at line {line}: {message}")]
    InvalidLine {
        kind: &'static str,
        line: usize,
        message: String,
    },

    /// Chrom sizes argument is not NAME=PATH
    #[error("Invalid assembly specification '{0}', expected NAME=PATH")]
    InvalidAssemblySpec(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the persistent view coordinator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Factory failed to create the view instance
    #[error("Failed to materialize view '{view}': {reason}")]
    Materialize { view: String, reason: String },
}

/// Consumer-facing pipeline failure carried in `PipelineState`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Input problem; replace or fix the file
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Internal resource problem; retry
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Every analysis phase failed
    #[error("Analysis unavailable: all {} phases failed", .0.len())]
    AllPhasesFailed(Vec<PhaseError>),
}

impl PipelineError {
    /// Whether retrying the same input may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Decode(_))
    }
}

/// Result type alias for BedLens operations
pub type Result<T> = std::result::Result<T, BedLensError>;

/// Result type alias for decoding operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Result type alias for analysis phases
pub type PhaseResult<T> = std::result::Result<T, PhaseError>;

/// Result type alias for context loading
pub type ContextResult<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_line_number() {
        let err = DecodeError::TooFewFields { line: 2, found: 1 };
        assert_eq!(err.line_number(), Some(2));
        assert_eq!(DecodeError::Empty.line_number(), None);
    }

    #[test]
    fn test_unsupported_encoding_message() {
        let err = DecodeError::UnsupportedEncoding {
            line: Some(4),
            reason: "invalid UTF-8".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported encoding at line 4: invalid UTF-8");

        let err = DecodeError::UnsupportedEncoding {
            line: None,
            reason: "UTF-16 byte order mark".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported encoding: UTF-16 byte order mark");
    }

    #[test]
    fn test_pipeline_error_retryable() {
        assert!(!PipelineError::Decode(DecodeError::Empty).is_retryable());
        let construction = ConstructionError::CapacityExceeded {
            requested: 10,
            limit: 5,
        };
        assert!(PipelineError::from(construction).is_retryable());
    }
}
