//! Byte-to-text codecs used by the read path.
//!
//! [`Encoding`] wraps any `encoding_rs` codec, so every WHATWG label (windows-1252,
//! Shift_JIS, GBK, UTF-16, ...) can be used to read a file. Decoding is always lossy: a
//! viewer has to show something for every line, so invalid sequences become U+FFFD instead
//! of failing the read. A region cut short by a byte limit is decoded with
//! [`Encoding::decode_partial_into`], which drops an incomplete trailing character instead
//! of rendering it as U+FFFD.

use encoding_rs::CoderResult;
use std::fmt;

/// Text encoding of the file being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding(&'static encoding_rs::Encoding);

const LF: u8 = b'\n';
const CR: u8 = b'\r';

impl Encoding {
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn utf16le() -> Self {
        Self(encoding_rs::UTF_16LE)
    }

    pub fn utf16be() -> Self {
        Self(encoding_rs::UTF_16BE)
    }

    /// The codec behind the `latin1` / `iso-8859-1` labels, which is windows-1252.
    pub fn latin1() -> Self {
        Self(encoding_rs::WINDOWS_1252)
    }

    /// Resolve an encoding label such as `utf-8`, `UTF-16LE`, `latin1` or `shift_jis`.
    ///
    /// Labels that only map to the replacement codec are rejected.
    pub fn from_label(label: &str) -> Option<Self> {
        encoding_rs::Encoding::for_label_no_replacement(label.trim().as_bytes()).map(Self)
    }

    /// Canonical name, accepted again by [`Encoding::from_label`].
    pub fn label(&self) -> &'static str {
        self.0.name()
    }

    fn is_utf8(&self) -> bool {
        self.0 == encoding_rs::UTF_8
    }

    fn is_utf16(&self) -> bool {
        self.0 == encoding_rs::UTF_16LE || self.0 == encoding_rs::UTF_16BE
    }

    /// Width in bytes of one code unit.
    pub fn unit_width(&self) -> usize {
        if self.is_utf16() {
            2
        } else {
            1
        }
    }

    /// Round `len` down to a whole number of code units.
    pub fn align_down(&self, len: usize) -> usize {
        len - len % self.unit_width()
    }

    /// Append the decoded form of `bytes` to `out`.
    pub fn decode_into(&self, bytes: &[u8], out: &mut String) {
        out.push_str(&self.0.decode_without_bom_handling(bytes).0);
    }

    /// Append the decoded form of a region that may end inside a character.
    ///
    /// An incomplete trailing sequence is dropped. Malformed bytes before it still decode
    /// to U+FFFD.
    pub fn decode_partial_into(&self, bytes: &[u8], out: &mut String) {
        if self.is_utf8() || self.is_utf16() {
            self.decode_into(&bytes[..self.complete_len(bytes)], out);
            return;
        }

        let mut decoder = self.0.new_decoder_without_bom_handling();
        let mut src = bytes;
        loop {
            let needed = decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or_else(|| src.len().saturating_mul(3));
            out.reserve(needed.max(4));
            let (result, read, _) = decoder.decode_to_string(src, out, false);
            src = &src[read..];
            if let CoderResult::InputEmpty = result {
                break;
            }
        }
    }

    /// Decode an owned byte region.
    ///
    /// Valid UTF-8 takes over the allocation of `bytes` without copying, which keeps the
    /// oversized-line path at a single allocation in the common case. `partial` marks a
    /// region that may end inside a character.
    pub fn decode_owned(&self, mut bytes: Vec<u8>, partial: bool) -> String {
        if self.is_utf8() {
            if partial {
                bytes.truncate(self.complete_len(&bytes));
            }
            return match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            };
        }

        let mut out = String::with_capacity(bytes.len());
        if partial {
            self.decode_partial_into(&bytes, &mut out);
        } else {
            self.decode_into(&bytes, &mut out);
        }
        out
    }

    /// Number of complete characters `bytes` decodes to.
    ///
    /// UTF-8 and UTF-16 count character starts rather than running a full decode, which
    /// is exact for well-formed input. An incomplete trailing character is not counted.
    pub fn char_count(&self, bytes: &[u8]) -> usize {
        if self.is_utf8() {
            return bytes[..self.complete_len(bytes)]
                .iter()
                .filter(|&&b| (b & 0xC0) != 0x80)
                .count();
        }
        if self.is_utf16() {
            return self
                .utf16_units(&bytes[..self.complete_len(bytes)])
                .filter(|u| !(0xDC00..=0xDFFF).contains(u))
                .count();
        }
        if self.0.is_single_byte() {
            return bytes.len();
        }
        let mut decoded = String::new();
        self.decode_partial_into(bytes, &mut decoded);
        decoded.chars().count()
    }

    /// Length of `bytes` once trailing CR and LF code units are removed.
    pub fn trim_eol(&self, bytes: &[u8]) -> usize {
        if !self.is_utf16() {
            return trim_eol_bytes(bytes);
        }
        let mut end = bytes.len();
        if end % 2 == 1 {
            return end;
        }
        while end >= 2 {
            let unit = self.unit_at(&bytes[end - 2..end]);
            if unit != u16::from(LF) && unit != u16::from(CR) {
                break;
            }
            end -= 2;
        }
        end
    }

    /// Length of `bytes` without an incomplete trailing UTF-8 or UTF-16 sequence.
    fn complete_len(&self, bytes: &[u8]) -> usize {
        if self.is_utf8() {
            return bytes.len() - utf8_incomplete_tail(bytes);
        }
        if !self.is_utf16() {
            return bytes.len();
        }
        let end = bytes.len() - bytes.len() % 2;
        match end.checked_sub(2) {
            Some(last) if (0xD800..=0xDBFF).contains(&self.unit_at(&bytes[last..end])) => last,
            _ => end,
        }
    }

    fn unit_at(&self, pair: &[u8]) -> u16 {
        if self.0 == encoding_rs::UTF_16BE {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    }

    fn utf16_units<'a>(&self, bytes: &'a [u8]) -> impl Iterator<Item = u16> + 'a {
        let big_endian = self.0 == encoding_rs::UTF_16BE;
        bytes.chunks_exact(2).map(move |pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl From<&'static encoding_rs::Encoding> for Encoding {
    fn from(codec: &'static encoding_rs::Encoding) -> Self {
        Self(codec)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(feature = "config")]
impl serde::Serialize for Encoding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[cfg(feature = "config")]
impl<'de> serde::Deserialize<'de> for Encoding {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown encoding: {}", label)))
    }
}

/// Length of `bytes` without its trailing CR/LF bytes.
pub(crate) fn trim_eol_bytes(bytes: &[u8]) -> usize {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], LF | CR) {
        end -= 1;
    }
    end
}

/// Bytes at the end of `bytes` that start a UTF-8 sequence without finishing it.
fn utf8_incomplete_tail(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    }

    fn partial(encoding: Encoding, bytes: &[u8]) -> String {
        let mut out = String::new();
        encoding.decode_partial_into(bytes, &mut out);
        out
    }

    #[test]
    fn test_from_label_aliases() {
        assert_eq!(Encoding::from_label("UTF-8"), Some(Encoding::utf8()));
        assert_eq!(Encoding::from_label("utf-16le"), Some(Encoding::utf16le()));
        assert_eq!(Encoding::from_label("UTF-16BE"), Some(Encoding::utf16be()));
        assert_eq!(Encoding::from_label("ISO-8859-1"), Some(Encoding::latin1()));
        assert_eq!(
            Encoding::from_label(" Shift_JIS "),
            Some(Encoding::from(encoding_rs::SHIFT_JIS))
        );
        assert_eq!(Encoding::from_label("ebcdic"), None);
        // Only resolves to the replacement codec
        assert_eq!(Encoding::from_label("iso-2022-kr"), None);
    }

    #[test]
    fn test_label_round_trips_through_from_label() {
        for encoding in [
            Encoding::utf8(),
            Encoding::utf16le(),
            Encoding::utf16be(),
            Encoding::latin1(),
            Encoding::from(encoding_rs::GBK),
        ] {
            assert_eq!(Encoding::from_label(encoding.label()), Some(encoding));
        }
    }

    #[test]
    fn test_decode_utf8_lossy() {
        let mut out = String::new();
        Encoding::utf8().decode_into(b"ok\xFFok", &mut out);
        assert_eq!(out, "ok\u{FFFD}ok");
    }

    #[test]
    fn test_decode_latin1() {
        let mut out = String::new();
        Encoding::latin1().decode_into(&[0x63, 0x61, 0x66, 0xE9, 0x80], &mut out);
        assert_eq!(out, "café€");
    }

    #[test]
    fn test_decode_legacy_multibyte() {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("日本語のログ");
        let mut out = String::new();
        Encoding::from(encoding_rs::SHIFT_JIS).decode_into(&bytes, &mut out);
        assert_eq!(out, "日本語のログ");
    }

    #[test]
    fn test_decode_utf16_both_orders() {
        let text = "grüße 𝄞";
        let mut le = String::new();
        Encoding::utf16le().decode_into(&utf16le(text), &mut le);
        assert_eq!(le, text);

        let mut be = String::new();
        Encoding::utf16be().decode_into(&utf16be(text), &mut be);
        assert_eq!(be, text);
    }

    #[test]
    fn test_decode_utf16_odd_tail() {
        let mut bytes = utf16le("ab");
        bytes.push(0x41);
        let mut out = String::new();
        Encoding::utf16le().decode_into(&bytes, &mut out);
        assert_eq!(out, "ab\u{FFFD}");
    }

    #[test]
    fn test_partial_decode_drops_incomplete_utf8() {
        let bytes = "a€".as_bytes();
        assert_eq!(partial(Encoding::utf8(), &bytes[..2]), "a");
        assert_eq!(partial(Encoding::utf8(), &bytes[..3]), "a");
        assert_eq!(partial(Encoding::utf8(), bytes), "a€");
        // Malformed bytes in the middle still show up
        assert_eq!(partial(Encoding::utf8(), b"a\xFFb\xE2"), "a\u{FFFD}b");
    }

    #[test]
    fn test_partial_decode_drops_incomplete_utf16() {
        let le = utf16le("a𝄞");
        assert_eq!(partial(Encoding::utf16le(), &le[..3]), "a");
        // Ends on the high surrogate
        assert_eq!(partial(Encoding::utf16le(), &le[..4]), "a");
        assert_eq!(partial(Encoding::utf16le(), &le), "a𝄞");

        let be = utf16be("a𝄞");
        assert_eq!(partial(Encoding::utf16be(), &be[..5]), "a");
        assert_eq!(partial(Encoding::utf16be(), &be), "a𝄞");
    }

    #[test]
    fn test_partial_decode_drops_incomplete_legacy_multibyte() {
        let shift_jis = Encoding::from(encoding_rs::SHIFT_JIS);
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("日本語");
        assert_eq!(partial(shift_jis, &bytes[..3]), "日");
        assert_eq!(shift_jis.char_count(&bytes[..3]), 1);
        assert_eq!(shift_jis.char_count(&bytes), 3);
    }

    #[test]
    fn test_decode_owned_reuses_valid_utf8_allocation() {
        let bytes = b"a fairly long line of plain ascii".to_vec();
        let ptr = bytes.as_ptr();
        let text = Encoding::utf8().decode_owned(bytes, false);
        assert_eq!(text.as_ptr(), ptr);
        assert_eq!(text, "a fairly long line of plain ascii");
    }

    #[test]
    fn test_decode_owned_matches_decode_into() {
        let samples: Vec<(Encoding, Vec<u8>)> = vec![
            (Encoding::utf8(), [&"naïve".as_bytes()[..], &[0xFF]].concat()),
            (Encoding::latin1(), vec![0xC0, 0x20, 0xFF]),
            (Encoding::utf16le(), utf16le("∑ over 𝄞")),
            (Encoding::utf16be(), utf16be("∑ over 𝄞")),
        ];
        for (encoding, bytes) in samples {
            let mut reference = String::new();
            encoding.decode_into(&bytes, &mut reference);
            assert_eq!(encoding.decode_owned(bytes, false), reference, "{encoding}");
        }
    }

    #[test]
    fn test_decode_owned_partial_region() {
        let mut bytes = "€€".as_bytes().to_vec();
        bytes.truncate(4);
        assert_eq!(Encoding::utf8().decode_owned(bytes, true), "€");

        let mut wide = utf16be("xy");
        wide.pop();
        assert_eq!(Encoding::utf16be().decode_owned(wide, true), "x");
    }

    #[test]
    fn test_char_count_matches_decode_for_valid_input() {
        let text = "héllo wörld 𝄞 ∑";
        assert_eq!(
            Encoding::utf8().char_count(text.as_bytes()),
            text.chars().count()
        );
        assert_eq!(
            Encoding::utf16le().char_count(&utf16le(text)),
            text.chars().count()
        );
        assert_eq!(
            Encoding::utf16be().char_count(&utf16be(text)),
            text.chars().count()
        );
        assert_eq!(Encoding::latin1().char_count(&[1, 2, 0xFF]), 3);
    }

    #[test]
    fn test_char_count_skips_incomplete_tail() {
        assert_eq!(Encoding::utf8().char_count(&"€€".as_bytes()[..5]), 1);
        assert_eq!(Encoding::utf16le().char_count(&utf16le("a𝄞")[..4]), 1);
    }

    #[test]
    fn test_trim_eol_single_byte_encodings() {
        for encoding in [Encoding::utf8(), Encoding::latin1()] {
            assert_eq!(encoding.trim_eol(b"abc\n"), 3);
            assert_eq!(encoding.trim_eol(b"abc\r"), 3);
            assert_eq!(encoding.trim_eol(b"abc\r\n"), 3);
            assert_eq!(encoding.trim_eol(b"abc"), 3);
            assert_eq!(encoding.trim_eol(b"\r\n"), 0);
            assert_eq!(encoding.trim_eol(b""), 0);
        }
    }

    #[test]
    fn test_trim_eol_utf16() {
        assert_eq!(Encoding::utf16le().trim_eol(&utf16le("ab\r\n")), 4);
        assert_eq!(Encoding::utf16be().trim_eol(&utf16be("ab\n")), 4);
        assert_eq!(Encoding::utf16le().trim_eol(&utf16le("ab")), 4);
        // U+0A0D has the LF byte in one half only and is not a terminator
        assert_eq!(Encoding::utf16le().trim_eol(&utf16le("\u{0A0D}")), 2);
    }

    #[test]
    fn test_alignment_follows_unit_width() {
        assert_eq!(Encoding::utf16le().unit_width(), 2);
        assert_eq!(Encoding::utf16le().align_down(7), 6);
        assert_eq!(Encoding::utf8().align_down(7), 7);
        assert_eq!(Encoding::from(encoding_rs::GBK).unit_width(), 1);
    }

    #[test]
    fn test_default_and_display() {
        assert_eq!(Encoding::default(), Encoding::utf8());
        assert_eq!(Encoding::utf16be().to_string(), "UTF-16BE");
        assert_eq!(Encoding::latin1().to_string(), "windows-1252");
    }
}
