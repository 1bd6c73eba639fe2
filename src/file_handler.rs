//! Positional byte sources for line extraction.
//!
//! This module provides the byte-level access read contexts build on: the
//! [`PositionalSource`] contract, a concrete lineage-sharing [`SourceInstance`], the
//! [`SourceFactory`] that picks a storage strategy for a file, and path/index validation.

pub mod factory;
pub mod source;
pub mod validation;

pub use factory::SourceFactory;
pub use source::{ByteSource, PositionalSource, SourceInstance};
pub use validation::{validate_file_path, validate_index};

/// Access strategy for opening a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum AccessStrategy {
    /// In-memory below the memory threshold, memory-mapped above it
    #[default]
    Auto,
    /// Load the whole file into memory
    InMemory,
    /// Memory-mapped file access for random access patterns
    MemoryMapped,
    /// Plain positional reads, one file handle per instance
    Positional,
}
