//! Positional byte sources
//!
//! A [`PositionalSource`] is the one resource read contexts share: every context reads
//! through its own instance, derived from a common lineage with
//! [`PositionalSource::new_instance_for_thread`]. Instances never share a cursor, so reads
//! from different threads do not need any locking.

use crate::error::{BiglineError, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backing store with positional reads and per-thread instances.
///
/// Short reads are normal: `read_at` may return fewer bytes than `buf` holds, and `Ok(0)`
/// signals end of data.
pub trait PositionalSource: Send + fmt::Debug {
    /// Read bytes starting at `position` into `buf`.
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Derive an independent instance of the same lineage for another thread.
    fn new_instance_for_thread(&self) -> io::Result<Box<dyn PositionalSource>>;

    /// Release this instance's handle. Other instances keep working.
    fn close_instance(&mut self);

    /// Close the whole lineage. Every instance fails subsequent reads.
    fn close(&mut self);

    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage strategy behind a source lineage
#[derive(Debug)]
pub enum ByteSource {
    /// Content loaded entirely into memory (small files)
    InMemory(Vec<u8>),
    /// Content accessed via memory mapping (large files)
    MemoryMapped(Mmap),
    /// Plain positional file reads; each instance opens its own handle
    File { path: PathBuf, len: u64 },
}

impl ByteSource {
    fn len(&self) -> u64 {
        match self {
            ByteSource::InMemory(bytes) => bytes.len() as u64,
            ByteSource::MemoryMapped(mmap) => mmap.len() as u64,
            ByteSource::File { len, .. } => *len,
        }
    }
}

#[derive(Debug)]
struct Lineage {
    backing: ByteSource,
    closed: AtomicBool,
}

/// One instance of a shared [`ByteSource`] lineage.
#[derive(Debug)]
pub struct SourceInstance {
    lineage: Arc<Lineage>,
    /// Private handle for `ByteSource::File`; unused for in-memory backings
    file: Option<File>,
    open: bool,
}

impl SourceInstance {
    /// Create the first instance of a new lineage.
    pub fn new(backing: ByteSource) -> Result<Self> {
        let lineage = Arc::new(Lineage {
            backing,
            closed: AtomicBool::new(false),
        });
        Self::with_lineage(lineage).map_err(|e| {
            BiglineError::file_error("Failed to open source instance", e)
        })
    }

    /// Convenience for in-memory content.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            lineage: Arc::new(Lineage {
                backing: ByteSource::InMemory(bytes.into()),
                closed: AtomicBool::new(false),
            }),
            file: None,
            open: true,
        }
    }

    fn with_lineage(lineage: Arc<Lineage>) -> io::Result<Self> {
        let file = match &lineage.backing {
            ByteSource::File { path, .. } => Some(File::open(path)?),
            _ => None,
        };
        Ok(Self {
            lineage,
            file,
            open: true,
        })
    }

    pub fn backing(&self) -> &ByteSource {
        &self.lineage.backing
    }

    /// Path of a file backed lineage.
    pub fn path(&self) -> Option<&Path> {
        match &self.lineage.backing {
            ByteSource::File { path, .. } => Some(path),
            _ => None,
        }
    }

    fn ensure_open(&self) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "source instance is closed",
            ));
        }
        if self.lineage.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "source has been closed",
            ));
        }
        Ok(())
    }
}

impl PositionalSource for SourceInstance {
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        match &self.lineage.backing {
            ByteSource::InMemory(bytes) => Ok(copy_at(bytes, position, buf)),
            ByteSource::MemoryMapped(mmap) => Ok(copy_at(&mmap[..], position, buf)),
            ByteSource::File { .. } => match self.file.as_ref() {
                Some(file) => read_file_at(file, position, buf),
                None => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "source instance has no file handle",
                )),
            },
        }
    }

    fn new_instance_for_thread(&self) -> io::Result<Box<dyn PositionalSource>> {
        if self.lineage.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "cannot derive an instance from a closed source",
            ));
        }
        Ok(Box::new(Self::with_lineage(Arc::clone(&self.lineage))?))
    }

    fn close_instance(&mut self) {
        self.open = false;
        self.file = None;
    }

    fn close(&mut self) {
        self.lineage.closed.store(true, Ordering::Release);
        self.close_instance();
    }

    fn len(&self) -> u64 {
        self.lineage.backing.len()
    }
}

fn copy_at(bytes: &[u8], position: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(position) else {
        return 0;
    };
    if start >= bytes.len() {
        return 0;
    }
    let n = buf.len().min(bytes.len() - start);
    buf[..n].copy_from_slice(&bytes[start..start + n]);
    n
}

#[cfg(unix)]
fn read_file_at(file: &File, position: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, position)
}

#[cfg(windows)]
fn read_file_at(file: &File, position: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, position)
}
