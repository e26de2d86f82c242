//! The conversion facade

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::pipeline::{self, ConvertReader, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
use crate::registry::{ConversionPath, Registry};
use crate::transform::ErrorMode;
use crate::{Error, Result};

/// Tuning knobs of a [`Converter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Size of each stage buffer in bytes; values below 64 are raised to 64
    pub buffer_size: usize,
    /// Reaction to malformed input and unmappable characters
    pub mode: ErrorMode,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            mode: ErrorMode::Replace,
        }
    }
}

impl ConverterOptions {
    /// Default options with [`ErrorMode::Strict`]
    pub fn strict() -> Self {
        Self::default().with_mode(ErrorMode::Strict)
    }

    /// Use `buffer_size` bytes per stage
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Use the given error mode
    pub fn with_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    fn stage_buffer(&self) -> usize {
        self.buffer_size.max(MIN_BUFFER_SIZE)
    }
}

/// A resolved conversion between two named encodings
///
/// Resolution happens once, in the constructor. The converter holds no
/// per-conversion state, so it can be shared between threads and reused for any
/// number of conversions.
///
/// ```
/// use fast_iconv::Converter;
///
/// let converter = Converter::new("GBK", "UTF-8").unwrap();
/// assert_eq!(converter.convert_text(b"\xc4\xe3\xba\xc3").unwrap(), "你好");
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    from: String,
    to: String,
    path: ConversionPath,
    options: ConverterOptions,
}

impl Converter {
    /// Converter between two built-in encodings
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Self::with_registry(Registry::global(), from, to)
    }

    /// Converter between two encodings of `registry`
    pub fn with_registry(registry: &Registry, from: &str, to: &str) -> Result<Self> {
        let path = registry.resolve(from, to)?;
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            path,
            options: ConverterOptions::default(),
        })
    }

    /// Replace the options
    pub fn with_options(mut self, options: ConverterOptions) -> Self {
        self.options = options;
        self
    }

    /// Source encoding name
    pub fn from_encoding(&self) -> &str {
        &self.from
    }

    /// Target encoding name
    pub fn to_encoding(&self) -> &str {
        &self.to
    }

    /// The resolved route
    pub fn path(&self) -> &ConversionPath {
        &self.path
    }

    /// Current options
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// Convert a complete byte sequence
    pub fn convert_bytes(&self, input: &[u8]) -> Result<Vec<u8>> {
        if self.path.is_identity() {
            return Ok(input.to_vec());
        }

        let buffer_size = input.len().clamp(MIN_BUFFER_SIZE, self.options.stage_buffer());
        let mut output = Vec::with_capacity(input.len());
        pipeline::apply(&self.path, input, self.options.mode, buffer_size)
            .read_to_end(&mut output)?;
        Ok(output)
    }

    /// Convert a complete byte sequence and return the result as text
    ///
    /// Fails with [`Error::NotText`] when the produced bytes are not valid UTF-8,
    /// which is the normal outcome for most non-Unicode targets.
    pub fn convert_text<T: AsRef<[u8]> + ?Sized>(&self, input: &T) -> Result<String> {
        let output = self.convert_bytes(input.as_ref())?;
        String::from_utf8(output).map_err(|err| Error::NotText {
            encoding: self.to.clone(),
            valid_up_to: err.utf8_error().valid_up_to(),
        })
    }

    /// Wrap `input` in a reader yielding the converted bytes
    ///
    /// Nothing is read from `input` until the returned reader is read.
    pub fn convert_stream<R: Read>(&self, input: R) -> ConvertReader<R> {
        pipeline::apply(
            &self.path,
            input,
            self.options.mode,
            self.options.stage_buffer(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charsets::{BIG5, CP850, GB18030, GBK, ISO_8859_1, SHIFT_JIS, UTF8};

    #[test]
    fn test_poem_to_gbk() {
        let expected = [
            0xBB, 0xA8, 0xBC, 0xE4, 0xD2, 0xBB, 0xBA, 0xF8, 0xBE, 0xC6, 0xA3, 0xAC, 0xB6, 0xC0,
            0xD7, 0xC3, 0xCE, 0xDE, 0xCF, 0xE0, 0xC7, 0xD7, 0xA1, 0xA3,
        ];
        for target in [GBK, GB18030] {
            let converter = Converter::new(UTF8, target).unwrap();
            let output = converter.convert_bytes("花间一壶酒，独酌无相亲。".as_bytes()).unwrap();
            assert_eq!(output, expected, "target {}", target);
        }
    }

    #[test]
    fn test_gb18030_four_byte_sequences() {
        let converter = Converter::new(UTF8, GB18030).unwrap();
        let output = converter
            .convert_bytes("\u{0081}\u{00de}\u{00df}\u{00e0}\u{00e1}\u{00e2}\u{00e3}\u{ffff}\u{10000}".as_bytes())
            .unwrap();
        assert_eq!(
            output,
            b"\x81\x30\x81\x31\x81\x30\x89\x37\x81\x30\x89\x38\xa8\xa4\xa8\xa2\
              \x81\x30\x89\x39\x81\x30\x8a\x30\x84\x31\xa4\x39\x90\x30\x81\x30"
        );
    }

    #[test]
    fn test_gbk_mixed() {
        let converter = Converter::new(UTF8, GBK).unwrap();
        let output = converter
            .convert_bytes("A\u{3000}\u{554a}\u{4e02}\u{4e90}\u{72dc}\u{7349}\u{02ca}\u{2588}Z€".as_bytes())
            .unwrap();
        assert_eq!(
            output,
            b"A\xa1\xa1\xb0\xa1\x81\x40\x81\x80\xaa\x40\xaa\x80\xa8\x40\xa8\x80Z\x80"
        );
    }

    #[test]
    fn test_convert_text() {
        let converter = Converter::new(GB18030, UTF8).unwrap();
        assert_eq!(converter.convert_text(b"\x80").unwrap(), "€");
        assert_eq!(converter.convert_text(&vec![0x41u8]).unwrap(), "A");

        let converter = Converter::new(UTF8, SHIFT_JIS).unwrap();
        assert!(matches!(
            converter.convert_text("世界"),
            Err(Error::NotText { valid_up_to: 0, .. })
        ));
        assert_eq!(converter.convert_text("plain ascii").unwrap(), "plain ascii");
    }

    #[test]
    fn test_direct_and_bridged_agree() {
        let input = b"Caf\xe9 \xc7a va \xbd";
        let direct = Converter::new(ISO_8859_1, CP850).unwrap();
        assert!(direct.path().is_direct());

        let decoded = Converter::new(ISO_8859_1, UTF8).unwrap().convert_bytes(input).unwrap();
        let bridged = Converter::new(UTF8, CP850).unwrap().convert_bytes(&decoded).unwrap();
        assert_eq!(direct.convert_bytes(input).unwrap(), bridged);
    }

    #[test]
    fn test_reuse() {
        let converter = Converter::new(UTF8, BIG5).unwrap();
        let first = converter.convert_bytes("Hello 世界".as_bytes()).unwrap();
        let second = converter.convert_bytes("Hello 世界".as_bytes()).unwrap();
        assert_eq!(first, second);
        assert_eq!(converter.from_encoding(), UTF8);
        assert_eq!(converter.to_encoding(), BIG5);
    }

    #[test]
    fn test_strict_options() {
        let converter = Converter::new(UTF8, GBK)
            .unwrap()
            .with_options(ConverterOptions::strict());
        assert!(matches!(
            converter.convert_bytes("a\u{1F600}".as_bytes()),
            Err(Error::UnmappableCharacter { character: '\u{1F600}', .. })
        ));

        let lenient = converter.clone().with_options(ConverterOptions::default());
        assert_eq!(lenient.convert_bytes("a\u{1F600}".as_bytes()).unwrap(), b"a?");
    }

    #[test]
    fn test_small_buffer_option() {
        let converter = Converter::new(UTF8, GBK)
            .unwrap()
            .with_options(ConverterOptions::default().with_buffer_size(1));
        let text = "花间一壶酒".repeat(100);
        let expected = Converter::new(UTF8, GBK).unwrap().convert_bytes(text.as_bytes()).unwrap();

        let mut output = Vec::new();
        converter
            .convert_stream(text.as_bytes())
            .read_to_end(&mut output)
            .unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_options_from_json() {
        let options: ConverterOptions = serde_json::from_str(r#"{"mode": "strict"}"#).unwrap();
        assert_eq!(options, ConverterOptions::strict());

        let options: ConverterOptions = serde_json::from_str(r#"{"buffer_size": 4096}"#).unwrap();
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(options.mode, ErrorMode::Replace);
    }
}
