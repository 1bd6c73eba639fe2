//! # bigline - Random-Access Lines From Huge Text Files
//!
//! Retrieves individual lines from arbitrarily large (multi-gigabyte) text files without
//! loading them, using a packed line offset index produced by an external indexing pass.
//!
//! ## Features
//!
//! - **Bounded memory**: each reader owns fixed scratch buffers; oversized lines take a
//!   one-off allocation instead of growing them
//! - **Prefix reads**: an adaptive bytes-per-char estimate avoids reading whole megabyte
//!   lines when only the start is shown
//! - **Parallel readers**: contexts derived per worker share only the immutable index and
//!   the source lineage
//! - **Crash-safe reads**: I/O failures come back as displayable diagnostics, never panics
//!
//! ## Architecture
//!
//! - [`error`] - Error types, read failures and decoded line results
//! - [`config`] - Reader configuration
//! - [`encoding`] - Byte-to-text codecs
//! - [`line_index`] - Packed line offset index snapshots
//! - [`file_handler`] - Positional byte sources and their factory
//! - [`reader`] - Read contexts: bounded, prefix and oversized line extraction
//! - [`scan`] - Parallel scans over derived contexts

// Core modules
pub mod config;
pub mod encoding;
pub mod error;
pub mod file_handler;
pub mod line_index;

// Core components
pub mod reader;
pub mod scan;

// Re-export commonly used types for convenience
pub use config::ReaderConfig;
pub use encoding::Encoding;
pub use error::{BiglineError, DecodedLine, LineResult, ReadFailure, Result};
pub use file_handler::{PositionalSource, SourceFactory};
pub use line_index::{LineEntry, LineIndex, FLAGS_SHIFT};
pub use reader::ReadContext;
pub use scan::{scan_lines, ScanReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
