//! File and index validation utilities.
//!
//! Checks that a file can be opened for positional reads and that an externally
//! produced line index actually fits the file it is paired with.

use crate::error::{BiglineError, Result};
use crate::line_index::{LineIndex, MAX_OFFSET};
use std::fs::File;
use std::path::Path;

/// Validate that a file path is accessible and suitable for line extraction
///
/// # Validations Performed
/// - Path exists and is a file (not a directory)
/// - File is readable by the current process
/// - File size fits the offset field of a packed index entry
///
/// Empty files are accepted: their index has a single boundary and no lines.
pub fn validate_file_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BiglineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| BiglineError::file_error("Failed to read file metadata", e))?;

    if !metadata.is_file() {
        return Err(BiglineError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    if metadata.len() > MAX_OFFSET {
        return Err(BiglineError::file_error(
            format!(
                "File is too large for packed line offsets ({} bytes): {}",
                metadata.len(),
                path.display()
            ),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "File too large"),
        ));
    }

    // Try to open the file to verify read permissions
    File::open(path).map_err(|e| BiglineError::file_error("Cannot open file for reading", e))?;

    Ok(())
}

/// Validate that every boundary of `index` lies within a source of `source_len` bytes.
pub fn validate_index(index: &LineIndex, source_len: u64) -> Result<()> {
    // Offsets are non-decreasing, so the last entry is the largest
    if let Some(last) = index.len().checked_sub(1).and_then(|i| index.offset(i)) {
        if last > source_len {
            return Err(BiglineError::index(format!(
                "last boundary {} lies beyond the end of the file ({} bytes)",
                last, source_len
            )));
        }
    }
    Ok(())
}
