//! Packed line offset index
//!
//! The index is produced by an external indexing pass and consumed here read-only. Each
//! entry is a `u64` whose high bits hold the byte offset of a line boundary and whose low
//! [`FLAGS_SHIFT`] bits hold per-line flags owned by the indexer. Line `i` spans
//! `[offset(i), offset(i + 1))`, so an index over `n` lines has `n + 1` entries.
//!
//! A [`LineIndex`] is an immutable snapshot behind an `Arc`. Cloning it is cheap and every
//! read context shares the same entries. Re-indexing a file produces a new snapshot; it is
//! never patched in place.

use crate::error::{BiglineError, Result};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// Width of the flag field in the low bits of each entry.
pub const FLAGS_SHIFT: u32 = 8;

/// Mask selecting the flag bits of an entry.
pub const FLAGS_MASK: u64 = (1 << FLAGS_SHIFT) - 1;

/// Largest byte offset an entry can carry.
pub const MAX_OFFSET: u64 = u64::MAX >> FLAGS_SHIFT;

/// One packed index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineEntry(u64);

impl LineEntry {
    /// Pack an offset and its flags. Fails if the offset does not fit next to the flags.
    pub fn pack(offset: u64, flags: u8) -> Result<Self> {
        if offset > MAX_OFFSET {
            return Err(BiglineError::index(format!(
                "offset {} exceeds the maximum of {}",
                offset, MAX_OFFSET
            )));
        }
        Ok(Self((offset << FLAGS_SHIFT) | u64::from(flags)))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn offset(self) -> u64 {
        self.0 >> FLAGS_SHIFT
    }

    pub fn flags(self) -> u8 {
        (self.0 & FLAGS_MASK) as u8
    }
}

/// Immutable, shareable snapshot of packed line boundaries.
#[derive(Debug, Clone)]
pub struct LineIndex {
    entries: Arc<[u64]>,
}

impl LineIndex {
    /// Wrap raw packed entries, checking that offsets never decrease.
    pub fn from_entries(entries: Vec<u64>) -> Result<Self> {
        if let Some(pos) = entries
            .windows(2)
            .position(|pair| (pair[0] >> FLAGS_SHIFT) > (pair[1] >> FLAGS_SHIFT))
        {
            return Err(BiglineError::index(format!(
                "offsets decrease between entries {} and {}",
                pos,
                pos + 1
            )));
        }
        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Build an index from plain byte offsets with all flags cleared.
    pub fn from_offsets(offsets: impl IntoIterator<Item = u64>) -> Result<Self> {
        let entries = offsets
            .into_iter()
            .map(|offset| LineEntry::pack(offset, 0).map(LineEntry::raw))
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    /// Decode an index file: a plain sequence of little-endian `u64` entries.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 8 != 0 {
            return Err(BiglineError::index(format!(
                "index length {} is not a multiple of 8 bytes",
                bytes.len()
            )));
        }
        let entries = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                u64::from_le_bytes(raw)
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Load an index file written by the external indexer (or [`LineIndex::write_to`]).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            BiglineError::file_error(format!("Failed to read index: {}", path.display()), e)
        })?;
        let index = Self::from_le_bytes(&bytes)?;
        log::debug!(
            "loaded line index {} with {} lines",
            path.display(),
            index.line_count()
        );
        Ok(index)
    }

    /// Persist the entries in the same format [`LineIndex::load`] reads.
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        for entry in self.entries.iter() {
            writer
                .write_all(&entry.to_le_bytes())
                .map_err(|e| BiglineError::file_error("Failed to write index", e))?;
        }
        Ok(())
    }

    /// Number of entries (line boundaries).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lines described by the boundaries.
    pub fn line_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn entry(&self, ordinal: usize) -> Option<LineEntry> {
        self.entries.get(ordinal).copied().map(LineEntry)
    }

    pub fn offset(&self, ordinal: usize) -> Option<u64> {
        self.entry(ordinal).map(LineEntry::offset)
    }

    pub fn flags(&self, ordinal: usize) -> Option<u8> {
        self.entry(ordinal).map(LineEntry::flags)
    }

    /// Byte range covered by boundaries `[from, until)`.
    ///
    /// `None` when `until` is past the last entry or `from > until`; callers treat that as
    /// an empty line rather than an error.
    pub fn byte_range(&self, from: usize, until: usize) -> Option<Range<u64>> {
        if from > until {
            return None;
        }
        let start = self.offset(from)?;
        let end = self.offset(until)?;
        Some(start..end)
    }

    /// Whether both handles refer to the same snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}
