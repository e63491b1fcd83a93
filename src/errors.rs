//! Error types returned by sorting jobs.
//!
//! Every failure of a job is reported as a single [`SortError`]. Each variant
//! maps onto one [`ErrorCode`], a small fixed enumeration whose numeric values
//! are stable and can be handed across language boundaries.

use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Result type alias for sorting operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Stable classification of a [`SortError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Input path or string is unreadable, absent or of an unknown format.
    InvalidInput,
    /// Output path or sink is unwritable.
    InvalidOutput,
    /// Malformed record text.
    ParseError,
    /// Thread count is zero or the worker pool could not be built.
    InvalidThreads,
    /// Failure while reading, writing or mapping, including sink failures.
    IoError,
    /// Any other precondition violation, e.g. an unsupported dialect tag.
    InvalidParameter,
}

impl ErrorCode {
    /// Numeric value of the code.
    pub fn as_i32(&self) -> i32 {
        match self {
            ErrorCode::InvalidInput => 1,
            ErrorCode::InvalidOutput => 2,
            ErrorCode::ParseError => 3,
            ErrorCode::InvalidThreads => 4,
            ErrorCode::IoError => 5,
            ErrorCode::InvalidParameter => -1,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let name = match self {
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::InvalidOutput => "InvalidOutput",
            ErrorCode::ParseError => "ParseError",
            ErrorCode::InvalidThreads => "InvalidThreads",
            ErrorCode::IoError => "IoError",
            ErrorCode::InvalidParameter => "InvalidParameter",
        };
        write!(f, "{}", name)
    }
}

/// Error type for sorting jobs
#[derive(Error, Debug)]
pub enum SortError {
    /// The input does not exist, is unreadable or is not GTF/GFF3
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The output cannot be created or written
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// A record line could not be parsed
    #[error("Parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number in the input
        line:   usize,
        /// What was wrong with the line
        reason: String,
    },

    /// The number of threads is unusable
    #[error("Invalid number of threads: {0}")]
    InvalidThreads(String),

    /// An I/O operation failed
    #[error("IO error while {context}: {source}")]
    Io {
        /// What the job was doing when the error occurred
        context: &'static str,
        /// Underlying error
        #[source]
        source:  io::Error,
    },

    /// The streaming sink reported a failure
    #[error("Output sink failed: {0}")]
    Sink(String),

    /// A precondition was violated
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SortError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SortError::InvalidInput(_) => ErrorCode::InvalidInput,
            SortError::InvalidOutput(_) => ErrorCode::InvalidOutput,
            SortError::Parse { .. } => ErrorCode::ParseError,
            SortError::InvalidThreads(_) => ErrorCode::InvalidThreads,
            SortError::Io { .. } | SortError::Sink(_) => ErrorCode::IoError,
            SortError::InvalidParameter(_) => ErrorCode::InvalidParameter,
        }
    }

    pub(crate) fn io(
        context: &'static str,
        source: io::Error,
    ) -> Self {
        SortError::Io { context, source }
    }

    pub(crate) fn parse<S: Into<String>>(
        line: usize,
        reason: S,
    ) -> Self {
        SortError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
