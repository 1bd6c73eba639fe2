//! Error types and handling infrastructure for bigline.
//!
//! Two kinds of failure live here:
//!
//! - [`BiglineError`] covers setup and misuse: opening files, loading an index,
//!   configuration, deriving contexts. These propagate with `?` like any other error.
//! - [`ReadFailure`] is the outcome of a line read whose positional read failed. The read
//!   path never panics and never returns a raw I/O error to the presentation layer;
//!   it hands back a `ReadFailure` carrying a displayable diagnostic instead, so callers can
//!   tell real file content apart from a rendered failure.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for bigline operations.
#[derive(Error, Debug)]
pub enum BiglineError {
    /// File system related errors (file not found, permission denied, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Memory mapping related errors
    #[error("Memory mapping failed: {message}")]
    MemoryMappingError { message: String },

    /// Malformed or mismatched line offset index
    #[error("Line index error: {message}")]
    IndexError { message: String },

    /// Configuration errors, including using a context before its buffers are sized
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A scan worker panicked or was cancelled
    #[error("Worker failed: {message}")]
    WorkerError { message: String },
}

/// Standard Result type for bigline operations.
pub type Result<T> = std::result::Result<T, BiglineError>;

impl BiglineError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a MemoryMappingError with a descriptive message
    pub fn memory_mapping(message: impl Into<String>) -> Self {
        Self::MemoryMappingError {
            message: message.into(),
        }
    }

    /// Create an IndexError with a descriptive message
    pub fn index(message: impl Into<String>) -> Self {
        Self::IndexError {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a WorkerError with a descriptive message
    pub fn worker(message: impl Into<String>) -> Self {
        Self::WorkerError {
            message: message.into(),
        }
    }
}

// Automatic conversion from io::Error to BiglineError
impl From<std::io::Error> for BiglineError {
    fn from(err: std::io::Error) -> Self {
        let message = match err.kind() {
            std::io::ErrorKind::NotFound => "File not found",
            std::io::ErrorKind::PermissionDenied => "Permission denied",
            _ => "IO operation failed",
        };
        Self::FileError {
            message: message.to_string(),
            source: err,
        }
    }
}

/// A line read that failed at the byte source.
///
/// `diagnostic` is the error description, cut to at most the destination capacity in bytes
/// (on a char boundary), ready to be shown in place of the line.
#[derive(Error, Debug)]
#[error("{diagnostic}")]
pub struct ReadFailure {
    diagnostic: String,
    #[source]
    source: std::io::Error,
}

impl ReadFailure {
    /// Render `source` into a diagnostic of at most `capacity` bytes.
    pub fn new(source: std::io::Error, capacity: usize) -> Self {
        let mut diagnostic = source.to_string();
        truncate_at_char_boundary(&mut diagnostic, capacity);
        Self { diagnostic, source }
    }

    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    pub fn io_error(&self) -> &std::io::Error {
        &self.source
    }

    /// Turn the failure into a displayable line, dropping the error signal.
    pub fn into_line(self) -> DecodedLine {
        DecodedLine {
            text: self.diagnostic,
            truncated: false,
        }
    }
}

/// Decoded text of one line range, not cached beyond the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedLine {
    pub text: String,
    /// The byte region was cut short (by the requested maximum or the buffer capacity).
    pub truncated: bool,
}

impl DecodedLine {
    pub fn new(text: String, truncated: bool) -> Self {
        Self { text, truncated }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result of every line extraction.
pub type LineResult = std::result::Result<DecodedLine, ReadFailure>;

fn truncate_at_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
