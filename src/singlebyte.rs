//! Table-driven single-byte encodings
//!
//! Decoding a single-byte encoding can never fail: every table maps all 256 bytes.
//! Encoding fails for characters outside the table. Two single-byte encodings can
//! also be converted into each other directly with a [`TranslationTable`].

use encoding_rs::EncoderResult;

use crate::tables::{byte_for, char_for};
use crate::transform::{
    Codec, EncodeStr, ErrorMode, Status, Step, Transform, Utf8Encoder, push_char,
};

/// Codec for an ASCII-compatible single-byte encoding
#[derive(Debug, Clone, Copy)]
pub struct SingleByteCodec {
    table: &'static [char; 128],
}

impl SingleByteCodec {
    /// Codec over the given upper-half table
    pub const fn new(table: &'static [char; 128]) -> Self {
        Self { table }
    }
}

impl Codec for SingleByteCodec {
    fn new_decoder(&self, _mode: ErrorMode) -> Box<dyn Transform> {
        Box::new(SingleByteDecoder { table: self.table })
    }

    fn new_encoder(&self, mode: ErrorMode) -> Box<dyn Transform> {
        Box::new(Utf8Encoder::new(SingleByteEncoder { table: self.table }, mode))
    }
}

struct SingleByteDecoder {
    table: &'static [char; 128],
}

impl Transform for SingleByteDecoder {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], _last: bool) -> Step {
        let mut written = 0;
        for (read, &byte) in src.iter().enumerate() {
            match push_char(&mut dst[written..], char_for(self.table, byte)) {
                Some(len) => written += len,
                None => return Step::new(Status::OutputFull, read, written),
            }
        }
        Step::new(Status::InputEmpty, src.len(), written)
    }
}

struct SingleByteEncoder {
    table: &'static [char; 128],
}

impl EncodeStr for SingleByteEncoder {
    fn encode_str(&mut self, src: &str, dst: &mut [u8], _last: bool) -> (EncoderResult, usize, usize) {
        let mut written = 0;
        for (pos, c) in src.char_indices() {
            let Some(byte) = byte_for(self.table, c) else {
                return (EncoderResult::Unmappable(c), pos + c.len_utf8(), written);
            };
            if written == dst.len() {
                return (EncoderResult::OutputFull, pos, written);
            }
            dst[written] = byte;
            written += 1;
        }
        (EncoderResult::InputEmpty, src.len(), written)
    }
}

/// Pre-computed byte-to-byte mapping between two single-byte encodings
#[derive(Debug, Clone)]
pub struct TranslationTable {
    /// Direct lookup table: source byte -> target byte
    table: [u8; 256],
    /// Bitmask of source bytes without a counterpart in the target
    unmappable_mask: [u64; 4],
    /// Source characters, for error reporting
    from: &'static [char; 128],
}

impl TranslationTable {
    /// Build the mapping from the `from` table into the `to` table
    pub fn new(from: &'static [char; 128], to: &'static [char; 128]) -> Self {
        let mut table = [0u8; 256];
        let mut unmappable_mask = [0u64; 4];

        for src_byte in 0..=255u8 {
            match byte_for(to, char_for(from, src_byte)) {
                Some(target) => table[src_byte as usize] = target,
                None => unmappable_mask[src_byte as usize / 64] |= 1u64 << (src_byte % 64),
            }
        }

        Self {
            table,
            unmappable_mask,
            from,
        }
    }

    /// Check if a byte has a counterpart in the target encoding
    #[inline]
    pub fn is_mappable(&self, byte: u8) -> bool {
        let word_idx = (byte as usize) / 64;
        let bit_idx = (byte as usize) % 64;
        (self.unmappable_mask[word_idx] & (1u64 << bit_idx)) == 0
    }

    /// Stateful transform over this table
    pub fn transform(&self, mode: ErrorMode) -> TranslationTransform {
        TranslationTransform {
            table: self.clone(),
            mode,
        }
    }
}

/// [`Transform`] applying a [`TranslationTable`]
pub struct TranslationTransform {
    table: TranslationTable,
    mode: ErrorMode,
}

impl Transform for TranslationTransform {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], _last: bool) -> Step {
        let len = src.len().min(dst.len());
        for (pos, (&byte, out)) in src.iter().zip(dst.iter_mut()).enumerate() {
            if self.table.is_mappable(byte) {
                *out = self.table.table[byte as usize];
            } else if self.mode == ErrorMode::Strict {
                let c = char_for(self.table.from, byte);
                return Step::new(Status::Unmappable(c), pos + 1, pos);
            } else {
                *out = b'?';
            }
        }
        let status = if len < src.len() {
            Status::OutputFull
        } else {
            Status::InputEmpty
        };
        Step::new(status, len, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{CP850, LATIN_1};

    fn run(transform: &mut dyn Transform, input: &[u8]) -> Vec<u8> {
        let mut dst = [0u8; 64];
        let step = transform.transform(input, &mut dst, true);
        assert_eq!(step.status, Status::InputEmpty);
        dst[..step.written].to_vec()
    }

    #[test]
    fn test_latin1_is_not_windows_1252() {
        let mut decoder = SingleByteCodec::new(&LATIN_1).new_decoder(ErrorMode::Replace);
        assert_eq!(run(decoder.as_mut(), &[0x80, 0xE9]), "\u{0080}é".as_bytes());
    }

    #[test]
    fn test_cp850_encode() {
        let mut encoder = SingleByteCodec::new(&CP850).new_encoder(ErrorMode::Replace);
        assert_eq!(run(encoder.as_mut(), "Café █€".as_bytes()), b"Caf\x82 \xDB?");
    }

    #[test]
    fn test_translation_table() {
        let table = TranslationTable::new(&LATIN_1, &CP850);
        assert!(table.is_mappable(0xE9));
        assert!(!table.is_mappable(0x85));

        let mut transform = table.transform(ErrorMode::Replace);
        assert_eq!(run(&mut transform, b"\xC7a\xE9\x85"), b"\x80a\x82?");
    }

    #[test]
    fn test_translation_strict() {
        let mut transform = TranslationTable::new(&CP850, &LATIN_1).transform(ErrorMode::Strict);
        let mut dst = [0u8; 8];
        let step = transform.transform(b"a\xB0", &mut dst, true);
        assert_eq!(step, Step::new(Status::Unmappable('\u{2591}'), 2, 1));
    }

    #[test]
    fn test_output_full() {
        let mut transform = TranslationTable::new(&LATIN_1, &CP850).transform(ErrorMode::Replace);
        let mut dst = [0u8; 2];
        let step = transform.transform(b"abc", &mut dst, false);
        assert_eq!(step, Step::new(Status::OutputFull, 2, 2));
    }
}
