//! Prefix reads with adaptive read-ahead
//!
//! Showing the first screenful of a multi-megabyte line should not cost a multi-megabyte
//! read. Prefix reads ask for roughly as many bytes as the wanted characters need, based
//! on a running bytes-per-char average, and stop once enough characters are buffered.
//! The average is kept per context so it adapts to narrow and wide encodings alike.

use crate::config::ReadAheadConfig;
use crate::error::{DecodedLine, LineResult, ReadFailure};
use crate::reader::context::{Filled, ReadContext};
use std::io;

/// Running bytes-per-character estimate
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAheadEstimator {
    bytes: f64,
    chars: f64,
    safety_margin: usize,
}

impl ReadAheadEstimator {
    pub fn new(config: &ReadAheadConfig) -> Self {
        Self {
            bytes: config.initial_bytes,
            chars: config.initial_chars,
            safety_margin: config.safety_margin,
        }
    }

    pub fn bytes_per_char(&self) -> f64 {
        self.bytes / self.chars
    }

    /// Bytes to request for `chars` more characters, margin included.
    pub fn bytes_for(&self, chars: usize) -> usize {
        // Float to int casts saturate
        let estimate = (chars as f64 * self.bytes_per_char()).ceil() as usize;
        estimate.saturating_add(self.safety_margin).max(1)
    }

    /// Fold an observed byte/char pair into the average.
    pub fn record(&mut self, bytes: usize, chars: usize) {
        self.bytes += bytes as f64;
        self.chars += chars as f64;
    }
}

impl ReadContext {
    /// Fill the byte buffer with enough of `[from, until)` to yield about `max_chars`
    /// characters. `None` or `Some(0)` reads as much of the line as the buffer holds.
    fn fill_prefix(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
    ) -> Result<Filled, ReadFailure> {
        let Some(max_chars) = max_chars.filter(|&n| n > 0) else {
            return self.fill_line(from, until);
        };
        let Some((start, line_len)) = self.resolve(from, until) else {
            return Ok(Filled::default());
        };

        let (limit, _) = self.clip(line_len, self.byte_buffer.len());
        let unit = self.encoding.unit_width();
        let mut filled = 0;
        let mut chars = 0;
        while filled < limit && chars < max_chars {
            let remaining = limit - filled;
            let mut want = self.estimator.bytes_for(max_chars - chars).min(remaining);
            if want < remaining {
                want = self.encoding.align_down(want).max(unit.min(remaining));
            }
            let n = match self.source.read_at(
                start + filled as u64,
                &mut self.byte_buffer[filled..filled + want],
            ) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.read_failure(err, self.byte_buffer.len())),
            };
            filled += n;
            chars = self.encoding.char_count(&self.byte_buffer[..filled]);
            self.estimator.record(filled, chars);
        }

        Ok(Filled {
            len: self.encoding.trim_eol(&self.byte_buffer[..filled]),
            truncated: filled < line_len && (chars >= max_chars || filled == limit),
        })
    }

    /// Like [`ReadContext::read_line_bytes`], reading only about `max_chars` characters.
    pub fn read_line_bytes_limited(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
    ) -> Result<usize, ReadFailure> {
        self.fill_prefix(from, until, max_chars).map(|filled| filled.len)
    }

    /// Like [`ReadContext::read_line_chars`], reading only about `max_chars` characters.
    pub fn read_line_chars_limited(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
    ) -> Result<&str, ReadFailure> {
        self.decode_prefix(from, until, max_chars)?;
        Ok(self.char_buffer.as_str())
    }

    /// Decode a prefix into the char buffer and report whether the line was cut.
    pub(crate) fn decode_prefix(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
    ) -> Result<bool, ReadFailure> {
        let filled = self.fill_prefix(from, until, max_chars)?;
        self.decode_buffer(filled);
        Ok(filled.truncated)
    }

    /// Decoded prefix of boundaries `[from, until)`.
    ///
    /// `max_chars` is a hint: every complete character read is decoded, so the text usually
    /// runs a little past `max_chars`. It is never shorter unless the line itself is, or the
    /// line does not fit the scratch buffer (then `truncated` is set). A character split by
    /// the end of the read is dropped, never shown as U+FFFD.
    pub fn extract_line_prefix(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
    ) -> LineResult {
        self.extract_line_prefix_with(from, until, max_chars, |_| {})
    }

    /// [`ReadContext::extract_line_prefix`] with an in-place transform applied to the
    /// decoded text before it is returned.
    pub fn extract_line_prefix_with<F>(
        &mut self,
        from: usize,
        until: usize,
        max_chars: Option<usize>,
        replacer: F,
    ) -> LineResult
    where
        F: FnOnce(&mut String),
    {
        let truncated = self.decode_prefix(from, until, max_chars)?;
        replacer(&mut self.char_buffer);
        Ok(DecodedLine::new(self.char_buffer.clone(), truncated))
    }

    pub fn read_ahead_estimator(&self) -> &ReadAheadEstimator {
        &self.estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::file_handler::SourceInstance;
    use crate::line_index::LineIndex;

    fn long_line_context(line: &str, capacity: usize) -> ReadContext {
        let content = format!("{line}\nnext\n");
        let index =
            LineIndex::from_offsets([0, line.len() as u64 + 1, content.len() as u64]).unwrap();
        let mut context =
            ReadContext::new(Encoding::utf8(), SourceInstance::from_bytes(content), index);
        context.set_max_buffer_size(capacity);
        context
    }

    #[test]
    fn test_estimator_seed_and_margin() {
        let estimator = ReadAheadEstimator::new(&ReadAheadConfig::default());
        assert_eq!(estimator.bytes_per_char(), 1.0);
        assert_eq!(estimator.bytes_for(100), 132);
    }

    #[test]
    fn test_estimator_learns_wide_ratio() {
        let mut estimator = ReadAheadEstimator::new(&ReadAheadConfig {
            safety_margin: 0,
            ..ReadAheadConfig::default()
        });
        for _ in 0..100 {
            estimator.record(300, 100);
        }
        assert!((estimator.bytes_per_char() - 3.0).abs() < 0.05);
        assert!(estimator.bytes_for(10) >= 30);
    }

    #[test]
    fn test_estimator_never_requests_zero_bytes() {
        let estimator = ReadAheadEstimator::new(&ReadAheadConfig {
            safety_margin: 0,
            initial_bytes: 1e-9,
            initial_chars: 1.0,
        });
        assert_eq!(estimator.bytes_for(1), 1);
    }

    #[test]
    fn test_prefix_reads_at_least_max_chars() {
        let line = "x".repeat(10_000);
        let mut context = long_line_context(&line, 64 * 1024);
        let prefix = context.extract_line_prefix(0, 1, Some(100)).unwrap();
        assert!(prefix.text.len() >= 100);
        assert!(prefix.text.len() < 1_000, "read far too much: {}", prefix.text.len());
        assert!(prefix.truncated);
    }

    #[test]
    fn test_prefix_of_short_line_is_whole_line() {
        let mut context = long_line_context("short", 1024);
        let prefix = context.extract_line_prefix(0, 1, Some(100)).unwrap();
        assert_eq!(prefix, DecodedLine::new("short".to_string(), false));
    }

    #[test]
    fn test_unbounded_prefix_reads_whole_line() {
        let line = "y".repeat(500);
        let mut context = long_line_context(&line, 1024);
        assert_eq!(context.extract_line_prefix(0, 1, None).unwrap().text, line);
        assert_eq!(context.extract_line_prefix(0, 1, Some(0)).unwrap().text, line);
    }

    #[test]
    fn test_prefix_is_capped_by_buffer_capacity() {
        let line = "z".repeat(500);
        let mut context = long_line_context(&line, 64);
        let prefix = context.extract_line_prefix(0, 1, Some(1_000)).unwrap();
        assert_eq!(prefix.text.len(), 64);
        assert!(prefix.truncated);
    }

    #[test]
    fn test_prefix_handles_multibyte_text() {
        let line = "ü€𝄞".repeat(2_000);
        let mut context = long_line_context(&line, 64 * 1024);
        for _ in 0..5 {
            let prefix = context.extract_line_prefix(0, 1, Some(50)).unwrap();
            assert!(prefix.text.chars().count() >= 50);
        }
        // Average of 1, 3 and 4 byte characters
        let ratio = context.read_ahead_estimator().bytes_per_char();
        assert!(ratio > 2.0, "estimator did not adapt: {ratio}");
    }

    #[test]
    fn test_replacer_transforms_text() {
        let mut context = long_line_context("a\tb\tc", 1024);
        let prefix = context
            .extract_line_prefix_with(0, 1, Some(10), |text| {
                *text = text.replace('\t', " ");
            })
            .unwrap();
        assert_eq!(prefix.text, "a b c");
    }

    #[test]
    fn test_read_line_chars_limited() {
        let line = "w".repeat(1_000);
        let mut context = long_line_context(&line, 4096);
        let text = context.read_line_chars_limited(0, 1, Some(10)).unwrap();
        assert!(text.len() >= 10 && text.len() < 1_000);
        let bytes = context.read_line_bytes_limited(0, 1, Some(10)).unwrap();
        assert!(bytes >= 10);
    }

    fn encoded_context(encoding: Encoding, content: Vec<u8>, capacity: usize) -> ReadContext {
        let index = LineIndex::from_offsets([0, content.len() as u64]).unwrap();
        let mut context = ReadContext::new(encoding, SourceInstance::from_bytes(content), index);
        context.set_max_buffer_size(capacity);
        context
    }

    #[test]
    fn test_utf16_prefix_never_splits_code_units() {
        let line = "abcdefghij".repeat(50);
        for (encoding, content) in [
            (
                Encoding::utf16le(),
                line.encode_utf16().flat_map(u16::to_le_bytes).collect::<Vec<u8>>(),
            ),
            (
                Encoding::utf16be(),
                line.encode_utf16().flat_map(u16::to_be_bytes).collect::<Vec<u8>>(),
            ),
        ] {
            let mut context = encoded_context(encoding, content, 4096);
            for max_chars in [1, 7, 8, 33, 150] {
                let prefix = context.extract_line_prefix(0, 1, Some(max_chars)).unwrap();
                assert!(!prefix.text.contains('\u{FFFD}'), "{encoding} {max_chars}");
                assert!(line.starts_with(&prefix.text), "{encoding} {max_chars}");
                assert!(prefix.text.chars().count() >= max_chars);
                assert!(prefix.truncated);
            }
        }
    }

    #[test]
    fn test_utf16_prefix_capped_by_odd_capacity() {
        let line = "𝄞x".repeat(40);
        let content: Vec<u8> = line.encode_utf16().flat_map(u16::to_le_bytes).collect();
        // 15 bytes round down to 7 code units, the last one a lone high surrogate
        let mut context = encoded_context(Encoding::utf16le(), content, 15);
        let prefix = context.extract_line_prefix(0, 1, Some(100)).unwrap();
        assert_eq!(prefix.text, "𝄞x𝄞x");
        assert!(prefix.truncated);
    }

    #[test]
    fn test_utf16_prefix_estimator_learns_wide_ratio() {
        let line = "wide".repeat(500);
        let content: Vec<u8> = line.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut context = encoded_context(Encoding::utf16le(), content, 64 * 1024);
        for _ in 0..10 {
            context.extract_line_prefix(0, 1, Some(40)).unwrap();
        }
        let ratio = context.read_ahead_estimator().bytes_per_char();
        assert!((ratio - 2.0).abs() < 0.1, "estimator did not adapt: {ratio}");
    }

    #[test]
    fn test_multibyte_prefix_drops_split_character() {
        let line = "€".repeat(200);
        let mut context = long_line_context(&line, 64 * 1024);
        let prefix = context.extract_line_prefix(0, 1, Some(11)).unwrap();
        assert!(!prefix.text.contains('\u{FFFD}'));
        assert!(prefix.text.chars().all(|c| c == '€'));
        assert!(prefix.text.chars().count() >= 11);
        assert!(prefix.truncated);
    }

    #[test]
    fn test_legacy_multibyte_prefix() {
        let line = "日本語のログ".repeat(30);
        let (content, _, _) = encoding_rs::SHIFT_JIS.encode(&line);
        let mut context =
            encoded_context(Encoding::from(encoding_rs::SHIFT_JIS), content.into_owned(), 4096);
        let prefix = context.extract_line_prefix(0, 1, Some(9)).unwrap();
        assert!(line.starts_with(&prefix.text));
        assert!(prefix.text.chars().count() >= 9);
    }

    #[test]
    fn test_prefix_out_of_range_is_empty() {
        let mut context = long_line_context("abc", 1024);
        assert_eq!(
            context.extract_line_prefix(0, 7, Some(3)).unwrap(),
            DecodedLine::empty()
        );
    }
}
