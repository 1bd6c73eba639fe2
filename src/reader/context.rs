//! Per-worker read context
//!
//! A [`ReadContext`] owns everything a reader mutates: a byte scratch buffer, a char
//! scratch buffer, a private source instance and the read-ahead estimator. The line index
//! is the only thing it shares, and that is an immutable snapshot. Parallel workers each
//! take their own context from [`ReadContext::new_instance_for_thread`] and never touch
//! each other's buffers, so no locks are involved anywhere on the read path.

use crate::config::{ReadAheadConfig, ReaderConfig};
use crate::encoding::Encoding;
use crate::error::{BiglineError, DecodedLine, LineResult, ReadFailure, Result};
use crate::file_handler::{validate_index, PositionalSource, SourceFactory};
use crate::line_index::LineIndex;
use crate::reader::adaptive::ReadAheadEstimator;
use std::io;
use std::path::Path;

/// Outcome of filling the byte scratch buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Filled {
    /// Bytes left after trimming the line terminator
    pub len: usize,
    pub truncated: bool,
}

#[derive(Debug)]
pub struct ReadContext {
    pub(crate) encoding: Encoding,
    index: LineIndex,
    pub(crate) source: Box<dyn PositionalSource>,
    pub(crate) byte_buffer: Vec<u8>,
    pub(crate) char_buffer: String,
    pub(crate) estimator: ReadAheadEstimator,
    read_ahead: ReadAheadConfig,
}

impl ReadContext {
    /// Create a context with unsized buffers.
    ///
    /// Call [`ReadContext::set_max_buffer_size`] before deriving other contexts from it.
    pub fn new<S>(encoding: Encoding, source: S, index: LineIndex) -> Self
    where
        S: PositionalSource + 'static,
    {
        Self::from_parts(
            encoding,
            Box::new(source),
            index,
            ReadAheadConfig::default(),
        )
    }

    /// Create a context sized and tuned by `config`.
    pub fn with_config<S>(config: &ReaderConfig, source: S, index: LineIndex) -> Result<Self>
    where
        S: PositionalSource + 'static,
    {
        config.validate()?;
        let mut context = Self::from_parts(
            config.encoding,
            Box::new(source),
            index,
            config.read_ahead.clone(),
        );
        context.set_max_buffer_size(config.buffer_capacity);
        Ok(context)
    }

    /// Open `path` together with its externally produced index file.
    pub fn open(path: &Path, index_path: &Path, config: &ReaderConfig) -> Result<Self> {
        let source = SourceFactory::open(path, config.strategy, config.memory_threshold)?;
        let index = LineIndex::load(index_path)?;
        validate_index(&index, source.len())?;
        Self::with_config(config, source, index)
    }

    fn from_parts(
        encoding: Encoding,
        source: Box<dyn PositionalSource>,
        index: LineIndex,
        read_ahead: ReadAheadConfig,
    ) -> Self {
        Self {
            encoding,
            index,
            source,
            byte_buffer: Vec::new(),
            char_buffer: String::new(),
            estimator: ReadAheadEstimator::new(&read_ahead),
            read_ahead,
        }
    }

    /// Derive a context for another worker with the same buffer capacity.
    ///
    /// # Errors
    /// `ConfigError` if this context's buffer size was never set.
    pub fn new_instance_for_thread(&self) -> Result<Self> {
        if self.byte_buffer.is_empty() {
            return Err(BiglineError::config(
                "max buffer size must be set before deriving a read context",
            ));
        }
        self.new_instance_with_capacity(self.byte_buffer.len())
    }

    /// Derive a context for another worker with its own buffer capacity.
    pub fn new_instance_with_capacity(&self, capacity: usize) -> Result<Self> {
        let source = self
            .source
            .new_instance_for_thread()
            .map_err(|e| BiglineError::file_error("Failed to derive source instance", e))?;
        let mut context = Self::from_parts(
            self.encoding,
            source,
            self.index.clone(),
            self.read_ahead.clone(),
        );
        context.set_max_buffer_size(capacity);
        log::debug!("derived read context with {} byte buffers", capacity);
        Ok(context)
    }

    /// Size both scratch buffers. Lines longer than this take the overflow path.
    pub fn set_max_buffer_size(&mut self, size: usize) {
        self.byte_buffer = vec![0; size];
        self.char_buffer = String::with_capacity(size);
    }

    pub fn max_buffer_size(&self) -> usize {
        self.byte_buffer.len()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    /// Raw bytes of the last buffered read; meaningful up to the length it returned.
    pub fn byte_buffer(&self) -> &[u8] {
        &self.byte_buffer
    }

    /// Text decoded by the last `read_line_chars*` call.
    pub fn char_buffer(&self) -> &str {
        &self.char_buffer
    }

    /// Close the source lineage shared with every derived context.
    pub fn close(&mut self) {
        self.source.close();
    }

    /// Close only this context's source instance.
    pub fn close_instance(&mut self) {
        self.source.close_instance();
    }

    /// Start offset and byte length of boundaries `[from, until)`; `None` for an empty or
    /// out-of-range request.
    pub(crate) fn resolve(&self, from: usize, until: usize) -> Option<(u64, usize)> {
        let range = self.index.byte_range(from, until)?;
        let len = usize::try_from(range.end - range.start).unwrap_or(usize::MAX);
        (len > 0).then_some((range.start, len))
    }

    pub(crate) fn read_failure(&self, err: io::Error, capacity: usize) -> ReadFailure {
        log::warn!("positional read failed: {}", err);
        ReadFailure::new(err, capacity)
    }

    /// Read up to `limit` bytes of the line at `start` into the byte buffer and trim it.
    fn fill_buffer(&mut self, start: u64, limit: usize) -> std::result::Result<usize, ReadFailure> {
        let limit = limit.min(self.byte_buffer.len());
        match read_fully(self.source.as_mut(), start, &mut self.byte_buffer[..limit]) {
            Ok(filled) => Ok(self.encoding.trim_eol(&self.byte_buffer[..filled])),
            Err(err) => Err(self.read_failure(err, self.byte_buffer.len())),
        }
    }

    pub(crate) fn fill_line(
        &mut self,
        from: usize,
        until: usize,
    ) -> std::result::Result<Filled, ReadFailure> {
        let Some((start, line_len)) = self.resolve(from, until) else {
            return Ok(Filled::default());
        };
        let (limit, truncated) = self.clip(line_len, self.byte_buffer.len());
        let len = self.fill_buffer(start, limit)?;
        Ok(Filled { len, truncated })
    }

    /// Cut a line of `line_len` bytes to at most `max` bytes on a code unit boundary.
    pub(crate) fn clip(&self, line_len: usize, max: usize) -> (usize, bool) {
        if line_len > max {
            (self.encoding.align_down(max), true)
        } else {
            (line_len, false)
        }
    }

    /// Read boundaries `[from, until)` into the byte buffer.
    ///
    /// Returns the number of bytes left after trimming CR/LF. Out-of-range requests read
    /// nothing and return 0. At most [`ReadContext::max_buffer_size`] bytes are read.
    pub fn read_line_bytes(
        &mut self,
        from: usize,
        until: usize,
    ) -> std::result::Result<usize, ReadFailure> {
        self.fill_line(from, until).map(|filled| filled.len)
    }

    /// Read boundaries `[from, until)` into a caller supplied buffer.
    ///
    /// Reads at most `buf.len()` bytes; returns the length after trimming CR/LF. The
    /// contents of `buf` are unspecified after a failure.
    pub fn read_line_bytes_into(
        &mut self,
        from: usize,
        until: usize,
        buf: &mut [u8],
    ) -> std::result::Result<usize, ReadFailure> {
        let Some((start, line_len)) = self.resolve(from, until) else {
            return Ok(0);
        };
        let (count, _) = self.clip(line_len, buf.len());
        match read_fully(self.source.as_mut(), start, &mut buf[..count]) {
            Ok(filled) => Ok(self.encoding.trim_eol(&buf[..filled])),
            Err(err) => Err(self.read_failure(err, buf.len())),
        }
    }

    /// Read and decode boundaries `[from, until)` into the char buffer.
    pub fn read_line_chars(
        &mut self,
        from: usize,
        until: usize,
    ) -> std::result::Result<&str, ReadFailure> {
        let filled = self.fill_line(from, until)?;
        self.decode_buffer(filled);
        Ok(self.char_buffer.as_str())
    }

    /// Decode the filled part of the byte buffer into the char buffer. A truncated region
    /// loses its incomplete trailing character rather than gaining a U+FFFD.
    pub(crate) fn decode_buffer(&mut self, filled: Filled) {
        self.char_buffer.clear();
        let bytes = &self.byte_buffer[..filled.len];
        if filled.truncated {
            self.encoding.decode_partial_into(bytes, &mut self.char_buffer);
        } else {
            self.encoding.decode_into(bytes, &mut self.char_buffer);
        }
    }

    /// Decoded text of boundaries `[from, until)`.
    ///
    /// Lines longer than `max_byte_length` are cut to at most that many bytes, on a code
    /// unit boundary, and flagged as truncated. A character split by the cut is dropped. A line that does not fit the scratch buffer is read through a one-off
    /// allocation instead of failing. Out-of-range requests yield an empty line.
    pub fn extract_line(&mut self, from: usize, until: usize, max_byte_length: usize) -> LineResult {
        let Some((start, line_len)) = self.resolve(from, until) else {
            return Ok(DecodedLine::empty());
        };
        let (len, truncated) = self.clip(line_len, max_byte_length);

        if len > self.byte_buffer.len() {
            return self.extract_oversized(start, len, truncated);
        }

        let len = self.fill_buffer(start, len)?;
        self.decode_buffer(Filled { len, truncated });
        Ok(DecodedLine::new(self.char_buffer.clone(), truncated))
    }
}

impl Drop for ReadContext {
    fn drop(&mut self) {
        self.source.close_instance();
    }
}

/// Fill `buf` from `position`, retrying short reads until it is full or the source
/// reports end of data. Returns the number of bytes read.
pub(crate) fn read_fully(
    source: &mut dyn PositionalSource,
    position: u64,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read_at(position + filled as u64, &mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
