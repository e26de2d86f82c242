//! HZ-GB2312 (RFC 1843)
//!
//! 7-bit framing of GB2312: `~{` switches to double-byte mode, `~}` back to ASCII,
//! `~~` is a literal tilde and `~` followed by a newline is a line continuation.
//! In double-byte mode each character is a GB2312 code with the high bit of both
//! bytes cleared. The GB2312 mapping itself comes from the GBK codec of
//! `encoding_rs`.

use encoding_rs::{DecoderResult, EncoderResult, GBK};

use crate::transform::{
    Codec, EncodeStr, ErrorMode, REPLACEMENT_CHARACTER, Status, Step, Transform, Utf8Encoder,
    push_char,
};

/// Codec for HZ-GB2312
#[derive(Debug, Clone, Copy, Default)]
pub struct HzCodec;

impl Codec for HzCodec {
    fn new_decoder(&self, mode: ErrorMode) -> Box<dyn Transform> {
        Box::new(HzDecoder {
            gbk: GBK.new_decoder_without_bom_handling(),
            mode,
            double_byte: false,
        })
    }

    fn new_encoder(&self, mode: ErrorMode) -> Box<dyn Transform> {
        Box::new(Utf8Encoder::new(
            HzEncoder {
                gbk: GBK.new_encoder(),
                double_byte: false,
            },
            mode,
        ))
    }
}

/// Whether a GBK pair lies in the GB2312 rows (symbols `A1-A9`, hanzi `B0-F7`)
fn is_gb2312([lead, trail]: [u8; 2]) -> bool {
    matches!(lead, 0xA1..=0xA9 | 0xB0..=0xF7) && (0xA1..=0xFE).contains(&trail)
}

fn is_private_use(c: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&c)
}

enum Unit {
    Char(char),
    Malformed,
    Shift,
}

struct HzDecoder {
    gbk: encoding_rs::Decoder,
    mode: ErrorMode,
    double_byte: bool,
}

impl HzDecoder {
    fn lookup(&mut self, lead: u8, trail: u8) -> Option<char> {
        let mut buf = [0u8; 4];
        let pair = [lead | 0x80, trail | 0x80];
        if !is_gb2312(pair) {
            return None;
        }
        let (result, _, written) = self.gbk.decode_to_utf8_without_replacement(&pair, &mut buf, false);
        match result {
            DecoderResult::InputEmpty => std::str::from_utf8(&buf[..written])
                .ok()?
                .chars()
                .next()
                .filter(|&c| !is_private_use(c)),
            _ => None,
        }
    }
}

impl Transform for HzDecoder {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], last: bool) -> Step {
        let mut read = 0;
        let mut written = 0;

        while read < src.len() {
            let byte = src[read];
            let (len, unit) = if byte == b'~' {
                match src.get(read + 1) {
                    None if !last => break,
                    None => (1, Unit::Malformed),
                    Some(b'{') => {
                        self.double_byte = true;
                        (2, Unit::Shift)
                    }
                    Some(b'}') => {
                        self.double_byte = false;
                        (2, Unit::Shift)
                    }
                    Some(b'\n') => (2, Unit::Shift),
                    Some(b'~') => (2, Unit::Char('~')),
                    Some(_) => (2, Unit::Malformed),
                }
            } else if byte >= 0x80 {
                (1, Unit::Malformed)
            } else if !self.double_byte {
                (1, Unit::Char(byte as char))
            } else {
                match src.get(read + 1) {
                    None if !last => break,
                    None => (1, Unit::Malformed),
                    Some(&trail) => {
                        if !(0x21..0x7F).contains(&byte) || !(0x21..0x7F).contains(&trail) {
                            (1, Unit::Malformed)
                        } else {
                            match self.lookup(byte, trail) {
                                Some(c) => (2, Unit::Char(c)),
                                None => (2, Unit::Malformed),
                            }
                        }
                    }
                }
            };

            let c = match unit {
                Unit::Shift => {
                    read += len;
                    continue;
                }
                Unit::Char(c) => c,
                Unit::Malformed if self.mode == ErrorMode::Strict => {
                    return Step::new(Status::Malformed, read + len, written);
                }
                Unit::Malformed => REPLACEMENT_CHARACTER,
            };
            match push_char(&mut dst[written..], c) {
                Some(n) => written += n,
                None => return Step::new(Status::OutputFull, read, written),
            }
            read += len;
        }

        if last && read == src.len() {
            self.double_byte = false;
        }
        Step::new(Status::InputEmpty, read, written)
    }
}

struct HzEncoder {
    gbk: encoding_rs::Encoder,
    double_byte: bool,
}

impl HzEncoder {
    /// GB2312 bytes of `c`, if it lies in the 94x94 GB2312 square
    fn gb2312(&mut self, c: char) -> Option<[u8; 2]> {
        let mut utf8 = [0u8; 4];
        let mut out = [0u8; 4];
        let text = c.encode_utf8(&mut utf8);
        let (result, _, written) = self.gbk.encode_from_utf8_without_replacement(text, &mut out, false);
        let pair = [out[0], out[1]];
        match (result, written) {
            (EncoderResult::InputEmpty, 2) if is_gb2312(pair) && !is_private_use(c) => Some(pair),
            _ => None,
        }
    }
}

impl EncodeStr for HzEncoder {
    fn encode_str(&mut self, src: &str, dst: &mut [u8], last: bool) -> (EncoderResult, usize, usize) {
        let mut written = 0;

        for (pos, c) in src.char_indices() {
            let room = dst.len() - written;
            if c.is_ascii() {
                let shift = if self.double_byte { 2 } else { 0 };
                let body = if c == '~' { 2 } else { 1 };
                if room < shift + body {
                    return (EncoderResult::OutputFull, pos, written);
                }
                if self.double_byte {
                    dst[written..written + 2].copy_from_slice(b"~}");
                    written += 2;
                    self.double_byte = false;
                }
                if c == '~' {
                    dst[written..written + 2].copy_from_slice(b"~~");
                } else {
                    dst[written] = c as u8;
                }
                written += body;
            } else {
                let Some([lead, trail]) = self.gb2312(c) else {
                    return (EncoderResult::Unmappable(c), pos + c.len_utf8(), written);
                };
                let shift = if self.double_byte { 0 } else { 2 };
                if room < shift + 2 {
                    return (EncoderResult::OutputFull, pos, written);
                }
                if !self.double_byte {
                    dst[written..written + 2].copy_from_slice(b"~{");
                    written += 2;
                    self.double_byte = true;
                }
                dst[written] = lead & 0x7F;
                dst[written + 1] = trail & 0x7F;
                written += 2;
            }
        }

        if last && self.double_byte {
            if dst.len() - written < 2 {
                return (EncoderResult::OutputFull, src.len(), written);
            }
            dst[written..written + 2].copy_from_slice(b"~}");
            written += 2;
            self.double_byte = false;
        }
        (EncoderResult::InputEmpty, src.len(), written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SAMPLE: &[u8] = b"This sentence is in ASCII.\n\
        The next sentence is in GB.~{<:Ky2;S{#,~}~\n~{NpJ)l6HK!#~}Bye.";

    fn run(transform: &mut dyn Transform, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        let mut dst = [0u8; 7];
        let mut src = input;
        loop {
            let step = transform.transform(src, &mut dst, true);
            output.extend_from_slice(&dst[..step.written]);
            src = &src[step.read..];
            assert!(!matches!(step.status, Status::Malformed | Status::Unmappable(_)));
            if step.status == Status::InputEmpty {
                return output;
            }
        }
    }

    #[test]
    fn test_rfc1843_sample() {
        let mut decoder = HzCodec.new_decoder(ErrorMode::Replace);
        let output = run(decoder.as_mut(), RFC_SAMPLE);
        assert_eq!(
            std::str::from_utf8(&output).unwrap(),
            "This sentence is in ASCII.\nThe next sentence is in GB.己所不欲，勿施於人。Bye."
        );
    }

    #[test]
    fn test_encode_shifts_and_tilde() {
        let mut encoder = HzCodec.new_encoder(ErrorMode::Replace);
        let output = run(encoder.as_mut(), "a~b己所不欲".as_bytes());
        assert_eq!(output, b"a~~b~{<:Ky2;S{~}");
    }

    #[test]
    fn test_unmappable_goes_back_to_ascii() {
        let mut encoder = HzCodec.new_encoder(ErrorMode::Replace);
        let output = run(encoder.as_mut(), "人€人".as_bytes());
        assert_eq!(output, b"~{HK~}?~{HK~}");
    }

    #[test]
    fn test_user_defined_rows_are_not_gb2312() {
        let mut encoder = HzCodec.new_encoder(ErrorMode::Replace);
        let output = run(encoder.as_mut(), "人\u{E000}\u{E4C5}".as_bytes());
        assert_eq!(output, b"~{HK~}??");

        let mut decoder = HzCodec.new_decoder(ErrorMode::Replace);
        let output = run(decoder.as_mut(), b"~{*!HK~}");
        assert_eq!(std::str::from_utf8(&output).unwrap(), "\u{FFFD}人");
    }

    #[test]
    fn test_split_escape() {
        let mut decoder = HzCodec.new_decoder(ErrorMode::Replace);
        let mut dst = [0u8; 16];
        let step = decoder.transform(b"x~", &mut dst, false);
        assert_eq!(step, Step::new(Status::InputEmpty, 1, 1));

        let step = decoder.transform(b"~{HK~}", &mut dst, true);
        assert_eq!(step.read, 6);
        assert_eq!(&dst[..step.written], "人".as_bytes());
    }

    #[test]
    fn test_malformed_bytes() {
        let mut decoder = HzCodec.new_decoder(ErrorMode::Replace);
        let output = run(decoder.as_mut(), b"a\xC8b~x");
        assert_eq!(std::str::from_utf8(&output).unwrap(), "a\u{FFFD}b\u{FFFD}");

        let mut decoder = HzCodec.new_decoder(ErrorMode::Strict);
        let mut dst = [0u8; 16];
        let step = decoder.transform(b"~{H", &mut dst, true);
        assert_eq!(step, Step::new(Status::Malformed, 3, 0));
    }
}
