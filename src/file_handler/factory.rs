//! Factory for creating positional sources.
//!
//! This module provides the SourceFactory which opens a file as the first
//! [`SourceInstance`] of a new lineage, choosing the backing storage from the file size.

use crate::error::{BiglineError, Result};
use crate::file_handler::source::{ByteSource, SourceInstance};
use crate::file_handler::validation::validate_file_path;
use crate::file_handler::AccessStrategy;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Factory for creating [`SourceInstance`] lineages
///
/// # Strategy Selection (`AccessStrategy::Auto`)
/// - Files below the memory threshold: In-memory (`ByteSource::InMemory`)
/// - Files at or above it: Memory mapping (`ByteSource::MemoryMapped`)
///
/// `AccessStrategy::Positional` skips both and issues plain positional file reads through
/// one handle per instance.
pub struct SourceFactory;

impl SourceFactory {
    /// Default size threshold between in-memory and memory-mapped backings
    pub const MEMORY_THRESHOLD: u64 = 50 * 1024 * 1024; // 50MB

    /// Open `path` as a new source lineage
    ///
    /// # Errors
    /// * File validation errors (non-existent, directory, not readable, too large)
    /// * Read or memory mapping failures
    pub fn open(
        path: &Path,
        strategy: AccessStrategy,
        memory_threshold: u64,
    ) -> Result<SourceInstance> {
        validate_file_path(path)?;

        let file = File::open(path).map_err(|e| {
            BiglineError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| BiglineError::file_error("Failed to get file metadata", e))?
            .len();

        let resolved = match strategy {
            AccessStrategy::Auto if file_size < memory_threshold => AccessStrategy::InMemory,
            AccessStrategy::Auto => AccessStrategy::MemoryMapped,
            forced => forced,
        };
        log::debug!(
            "opening {} ({} bytes) with {:?} strategy",
            path.display(),
            file_size,
            resolved
        );

        let backing = match resolved {
            AccessStrategy::InMemory | AccessStrategy::Auto => {
                let mut content = Vec::with_capacity(file_size as usize);
                let mut file = file;
                file.read_to_end(&mut content)
                    .map_err(|e| BiglineError::file_error("Failed to read file", e))?;
                ByteSource::InMemory(content)
            }
            // Mapping a zero-length file fails on some platforms
            AccessStrategy::MemoryMapped if file_size == 0 => ByteSource::InMemory(Vec::new()),
            AccessStrategy::MemoryMapped => {
                let mmap = unsafe {
                    Mmap::map(&file).map_err(|e| {
                        BiglineError::memory_mapping(format!(
                            "Failed to memory map file {}: {}",
                            path.display(),
                            e
                        ))
                    })?
                };
                ByteSource::MemoryMapped(mmap)
            }
            AccessStrategy::Positional => ByteSource::File {
                path: path.to_path_buf(),
                len: file_size,
            },
        };

        SourceInstance::new(backing)
    }
}
