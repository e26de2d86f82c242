//! Multi-byte encoding support backed by `encoding_rs`
//!
//! This module adapts the WHATWG decoders and encoders of `encoding_rs` to the
//! [`Transform`] contract. The East-Asian double-byte encodings and the stateful
//! ISO-2022-JP all go through here.
//!
//! GBK and GB-18030 leave the user-defined areas unmapped (`AAA1-AFFE`,
//! `F8A1-FEFE`, `A140-A7A0`). WHATWG maps those to U+E000-U+E765; here they are
//! malformed when decoding and unmappable when encoding.

use encoding_rs::{CoderResult, DecoderResult, EncoderResult, Encoding, GB18030, GBK};

use crate::transform::{
    Codec, EncodeStr, ErrorMode, REPLACEMENT_CHARACTER, Status, Step, Transform, Utf8Encoder,
    push_char,
};

/// Codec for any encoding known to `encoding_rs`
#[derive(Debug, Clone, Copy)]
pub struct MultiByteCodec {
    encoding: &'static Encoding,
    user_defined_unmapped: bool,
}

impl MultiByteCodec {
    /// Codec for the given `encoding_rs` encoding
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            user_defined_unmapped: encoding == GBK || encoding == GB18030,
        }
    }
}

impl Codec for MultiByteCodec {
    fn new_decoder(&self, mode: ErrorMode) -> Box<dyn Transform> {
        let decoder = MultiByteDecoder {
            decoder: self.encoding.new_decoder_without_bom_handling(),
            mode,
        };
        if self.user_defined_unmapped {
            Box::new(GbDecoder { inner: decoder })
        } else {
            Box::new(decoder)
        }
    }

    fn new_encoder(&self, mode: ErrorMode) -> Box<dyn Transform> {
        let encoder = self.encoding.new_encoder();
        if self.user_defined_unmapped {
            Box::new(Utf8Encoder::new(GbEncoder { inner: encoder }, mode))
        } else {
            Box::new(Utf8Encoder::new(encoder, mode))
        }
    }
}

struct MultiByteDecoder {
    decoder: encoding_rs::Decoder,
    mode: ErrorMode,
}

impl Transform for MultiByteDecoder {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], last: bool) -> Step {
        match self.mode {
            ErrorMode::Replace => {
                let (result, read, written, _) = self.decoder.decode_to_utf8(src, dst, last);
                let status = match result {
                    CoderResult::InputEmpty => Status::InputEmpty,
                    CoderResult::OutputFull => Status::OutputFull,
                };
                Step::new(status, read, written)
            }
            ErrorMode::Strict => {
                let (result, read, written) =
                    self.decoder.decode_to_utf8_without_replacement(src, dst, last);
                let status = match result {
                    DecoderResult::InputEmpty => Status::InputEmpty,
                    DecoderResult::OutputFull => Status::OutputFull,
                    DecoderResult::Malformed(..) => Status::Malformed,
                };
                Step::new(status, read, written)
            }
        }
    }
}

#[inline]
fn is_user_defined_pair(lead: u8, trail: u8) -> bool {
    match lead {
        0xAA..=0xAF | 0xF8..=0xFE => (0xA1..=0xFE).contains(&trail),
        0xA1..=0xA7 => matches!(trail, 0x40..=0x7E | 0x80..=0xA0),
        _ => false,
    }
}

#[inline]
fn is_user_defined_char(c: char) -> bool {
    ('\u{E000}'..='\u{E765}').contains(&c)
}

#[inline]
fn is_lead(byte: u8) -> bool {
    (0x81..=0xFE).contains(&byte)
}

/// Where a scan of GB input stopped
enum Stop {
    /// Every byte belongs to a complete sequence, or the input is final
    End,
    /// An incomplete sequence starts here
    Incomplete(usize),
    /// `len` bytes at `pos` decode to nothing
    Reject { pos: usize, len: usize },
}

/// Walk `src` sequence by sequence, following the WHATWG gb18030 framing
fn scan_gb(src: &[u8], last: bool) -> Stop {
    let mut i = 0;
    while i < src.len() {
        let lead = src[i];
        if !is_lead(lead) {
            i += 1;
            continue;
        }
        let Some(&second) = src.get(i + 1) else {
            return if last { Stop::End } else { Stop::Incomplete(i) };
        };
        i += match second {
            0x30..=0x39 => match (src.get(i + 2), src.get(i + 3)) {
                (Some(&third), Some(&fourth)) if is_lead(third) && fourth.is_ascii_digit() => 4,
                // the inner decoder would hold the first two bytes back
                (Some(&third), Some(_)) if is_lead(third) => return Stop::Reject { pos: i, len: 1 },
                (Some(&third), None) if is_lead(third) && !last => return Stop::Incomplete(i),
                (None, _) if !last => return Stop::Incomplete(i),
                _ => 1,
            },
            0x40..=0x7E | 0x80..=0xFE if is_user_defined_pair(lead, second) => {
                return Stop::Reject { pos: i, len: 2 };
            }
            0x40..=0x7E | 0x80..=0xFF => 2,
            _ => 1,
        };
    }
    Stop::End
}

/// GBK / GB-18030 decoder that rejects the user-defined areas
///
/// Only complete sequences are handed to the inner decoder, so it never keeps
/// state between calls.
struct GbDecoder {
    inner: MultiByteDecoder,
}

impl Transform for GbDecoder {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], last: bool) -> Step {
        let mut read = 0;
        let mut written = 0;

        loop {
            let rest = &src[read..];
            let stop = scan_gb(rest, last);
            let clean = match stop {
                Stop::End => rest.len(),
                Stop::Incomplete(pos) | Stop::Reject { pos, .. } => pos,
            };
            let final_run = last && matches!(stop, Stop::End);
            let step = self
                .inner
                .transform(&rest[..clean], &mut dst[written..], final_run);
            read += step.read;
            written += step.written;
            if step.status != Status::InputEmpty {
                return Step::new(step.status, read, written);
            }

            match stop {
                Stop::End | Stop::Incomplete(_) => {
                    return Step::new(Status::InputEmpty, read, written);
                }
                Stop::Reject { len, .. } if self.inner.mode == ErrorMode::Strict => {
                    return Step::new(Status::Malformed, read + len, written);
                }
                Stop::Reject { len, .. } => {
                    match push_char(&mut dst[written..], REPLACEMENT_CHARACTER) {
                        Some(n) => {
                            read += len;
                            written += n;
                        }
                        None => return Step::new(Status::OutputFull, read, written),
                    }
                }
            }
        }
    }
}

/// Longest stretch of text checked for user-defined characters per inner call
const ENCODE_WINDOW: usize = 256;

/// GBK / GB-18030 encoder that reports the user-defined areas as unmappable
struct GbEncoder {
    inner: encoding_rs::Encoder,
}

impl EncodeStr for GbEncoder {
    fn encode_str(&mut self, src: &str, dst: &mut [u8], last: bool) -> (EncoderResult, usize, usize) {
        let mut read = 0;
        let mut written = 0;

        loop {
            let rest = &src[read..];
            let mut end = rest.len().min(ENCODE_WINDOW);
            while !rest.is_char_boundary(end) {
                end += 1;
            }
            let window = &rest[..end];
            let unmapped = window.char_indices().find(|&(_, c)| is_user_defined_char(c));
            let chunk = match unmapped {
                Some((pos, _)) => &window[..pos],
                None => window,
            };
            let whole = unmapped.is_none() && end == rest.len();

            let (result, r, w) = self.inner.encode_from_utf8_without_replacement(
                chunk,
                &mut dst[written..],
                last && whole,
            );
            read += r;
            written += w;
            if result != EncoderResult::InputEmpty {
                return (result, read, written);
            }
            if let Some((_, c)) = unmapped {
                return (EncoderResult::Unmappable(c), read + c.len_utf8(), written);
            }
            if whole {
                return (EncoderResult::InputEmpty, read, written);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{BIG5, SHIFT_JIS};

    fn convert(transform: &mut dyn Transform, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        let mut dst = [0u8; 16];
        let mut src = input;
        loop {
            let step = transform.transform(src, &mut dst, true);
            output.extend_from_slice(&dst[..step.written]);
            src = &src[step.read..];
            if step.status == Status::InputEmpty {
                return output;
            }
        }
    }

    #[test]
    fn test_gbk_decode() {
        let mut decoder = MultiByteCodec::new(GBK).new_decoder(ErrorMode::Replace);
        let output = convert(decoder.as_mut(), b"\xc4\xe3\xba\xc3");
        assert_eq!(std::str::from_utf8(&output).unwrap(), "你好");
    }

    #[test]
    fn test_gb18030_euro_byte() {
        let mut decoder = MultiByteCodec::new(GB18030).new_decoder(ErrorMode::Replace);
        let output = convert(decoder.as_mut(), b"\x80");
        assert_eq!(std::str::from_utf8(&output).unwrap(), "€");
    }

    #[test]
    fn test_malformed_is_replaced() {
        let mut decoder = MultiByteCodec::new(GBK).new_decoder(ErrorMode::Replace);
        let output = convert(decoder.as_mut(), b"a\xffb");
        assert_eq!(std::str::from_utf8(&output).unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn test_user_defined_area_is_malformed() {
        for encoding in [GBK, GB18030] {
            let mut decoder = MultiByteCodec::new(encoding).new_decoder(ErrorMode::Replace);
            let output = convert(decoder.as_mut(), b"a\xfe\xfeb\xaa\xa1\xa1\x40\xc4\xe3");
            assert_eq!(
                std::str::from_utf8(&output).unwrap(),
                "a\u{FFFD}b\u{FFFD}\u{FFFD}你"
            );
        }

        let mut decoder = MultiByteCodec::new(GBK).new_decoder(ErrorMode::Strict);
        let mut dst = [0u8; 16];
        let step = decoder.transform(b"ab\xfe\xfec", &mut dst, true);
        assert_eq!(step, Step::new(Status::Malformed, 4, 2));
    }

    #[test]
    fn test_split_sequences_are_held_back() {
        let mut decoder = MultiByteCodec::new(GB18030).new_decoder(ErrorMode::Replace);
        let mut dst = [0u8; 16];

        let step = decoder.transform(b"a\xfe", &mut dst, false);
        assert_eq!(step, Step::new(Status::InputEmpty, 1, 1));
        let step = decoder.transform(b"\xfe\xfeb", &mut dst, true);
        assert_eq!(step.read, 3);
        assert_eq!(&dst[..step.written], "\u{FFFD}b".as_bytes());

        // a lead, a digit, then a pair instead of the rest of a four-byte sequence
        let mut fresh = MultiByteCodec::new(GB18030).new_decoder(ErrorMode::Replace);
        let output = convert(fresh.as_mut(), b"\x81\x30\xfe\xfez\x81\x30\xc4\xe3");
        assert_eq!(
            std::str::from_utf8(&output).unwrap(),
            "\u{FFFD}0\u{FFFD}z\u{FFFD}0你"
        );

        // U+0081, four bytes
        let step = decoder.transform(b"\x81\x30\x81", &mut dst, false);
        assert_eq!(step, Step::new(Status::InputEmpty, 0, 0));
        let step = decoder.transform(b"\x81\x30\x81\x31", &mut dst, true);
        assert_eq!(step.read, 4);
        assert_eq!(&dst[..step.written], "\u{0081}".as_bytes());
    }

    #[test]
    fn test_malformed_strict() {
        let mut decoder = MultiByteCodec::new(SHIFT_JIS).new_decoder(ErrorMode::Strict);
        let mut dst = [0u8; 16];
        let step = decoder.transform(b"a\xffb", &mut dst, true);
        assert_eq!(step.status, Status::Malformed);
        assert_eq!(&dst[..step.written], b"a");
    }

    #[test]
    fn test_big5_encode() {
        let mut encoder = MultiByteCodec::new(BIG5).new_encoder(ErrorMode::Replace);
        let output = convert(encoder.as_mut(), "Hello 世界".as_bytes());
        assert_eq!(output, [72, 101, 108, 108, 111, 32, 165, 64, 172, 201]);
    }

    #[test]
    fn test_unmappable_is_substituted() {
        let mut encoder = MultiByteCodec::new(GBK).new_encoder(ErrorMode::Replace);
        let output = convert(encoder.as_mut(), "a\u{1F600}b".as_bytes());
        assert_eq!(output, b"a?b");
    }

    #[test]
    fn test_user_defined_char_is_unmappable() {
        let mut encoder = MultiByteCodec::new(GBK).new_encoder(ErrorMode::Replace);
        let output = convert(encoder.as_mut(), "a\u{E4C5}你".as_bytes());
        assert_eq!(output, b"a?\xc4\xe3");

        let text = "你".repeat(200) + "\u{E000}";
        let mut encoder = MultiByteCodec::new(GB18030).new_encoder(ErrorMode::Strict);
        let mut dst = [0u8; 1024];
        let step = encoder.transform(text.as_bytes(), &mut dst, true);
        assert_eq!(step, Step::new(Status::Unmappable('\u{E000}'), text.len(), 400));
    }
}
