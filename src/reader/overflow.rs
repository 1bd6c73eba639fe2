//! Lines longer than the scratch buffers
//!
//! Rare oversized lines get a one-off allocation sized to the line instead of growing the
//! context's persistent buffers. The allocation holds the raw bytes and, for UTF-8, becomes
//! the returned `String` itself, so valid text is decoded without a second buffer. Other
//! encodings can grow when decoded to UTF-8 (a Latin-1 byte may need two bytes), so they
//! decode into a fresh string.

use crate::error::{DecodedLine, LineResult};
use crate::reader::context::{read_fully, ReadContext};
use std::io;

impl ReadContext {
    pub(crate) fn extract_oversized(&mut self, start: u64, len: usize, truncated: bool) -> LineResult {
        log::debug!(
            "line of {} bytes exceeds the {} byte buffer, using a one-off allocation",
            len,
            self.byte_buffer.len()
        );

        let mut region = Vec::new();
        if let Err(err) = region.try_reserve_exact(len) {
            return Err(self.read_failure(io::Error::new(io::ErrorKind::OutOfMemory, err), len));
        }
        region.resize(len, 0);

        let filled = match read_fully(self.source.as_mut(), start, &mut region) {
            Ok(filled) => filled,
            Err(err) => return Err(self.read_failure(err, len)),
        };
        region.truncate(filled);
        let end = self.encoding.trim_eol(&region);
        region.truncate(end);

        Ok(DecodedLine::new(
            self.encoding.decode_owned(region, truncated),
            truncated,
        ))
    }
}
