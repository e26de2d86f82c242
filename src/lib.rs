//! # FastIconv - Streaming Character Set Conversion
//!
//! Converts bytes between named character encodings by composing per-encoding
//! decode and encode transforms.
//!
//! ## Features
//!
//! - **Explicit path resolution**: identity, then a registered direct transform,
//!   then a bridge through UTF-8
//! - **Streaming**: any [`std::io::Read`] can be converted lazily with bounded memory
//! - **Lenient by default**: malformed input becomes U+FFFD, unmappable characters
//!   become `?`; a strict mode is available
//! - **Thread-safe**: registries and converters are immutable and shareable
//!
//! ## Quick Start
//!
//! ```rust
//! use fast_iconv::Converter;
//!
//! let converter = Converter::new("UTF-8", "GBK").unwrap();
//! let gbk = converter.convert_bytes("你好".as_bytes()).unwrap();
//! assert_eq!(gbk, [0xC4, 0xE3, 0xBA, 0xC3]);
//!
//! let text = fast_iconv::convert_text(&gbk, "GBK", "UTF-8").unwrap();
//! assert_eq!(text, "你好");
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::io::{self, Read};

pub mod charsets;
mod converter;
pub mod hz;
pub mod multibyte;
pub mod pipeline;
pub mod registry;
pub mod singlebyte;
mod tables;
pub mod transform;

pub use converter::{Converter, ConverterOptions};
pub use pipeline::ConvertReader;
pub use registry::{ConversionPath, Registry, RegistryBuilder};
pub use transform::{Codec, ErrorMode, Transform, TransformFactory};

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of an encoding pair could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownSide {
    /// No decoder for the source encoding
    From,
    /// No encoder for the target encoding
    To,
    /// Neither side is registered
    Both,
}

/// Errors that can occur during conversion
#[derive(Debug)]
pub enum Error {
    /// No identity, direct or bridged path exists
    UnsupportedEncodingPair {
        /// Source encoding name
        from: String,
        /// Target encoding name
        to: String,
        /// The unresolved side(s)
        unknown: UnknownSide,
    },
    /// The input stream failed
    Io(io::Error),
    /// Malformed input in strict mode
    MalformedInput {
        /// Encoding the stage was reading
        encoding: String,
        /// Input bytes of that stage consumed, including the malformed sequence
        offset: u64,
    },
    /// A character without representation in the target, in strict mode
    UnmappableCharacter {
        /// Encoding the stage was writing
        encoding: String,
        /// The unmappable character
        character: char,
        /// Input bytes of that stage consumed, including the character
        offset: u64,
    },
    /// Converted bytes requested as text are not UTF-8
    NotText {
        /// Target encoding name
        encoding: String,
        /// Length of the valid UTF-8 prefix
        valid_up_to: usize,
    },
    /// A transform for the same pair was already registered
    DuplicateRegistration {
        /// Source encoding name
        from: String,
        /// Target encoding name
        to: String,
    },
    /// A transform from an encoding to itself was registered
    SelfRegistration {
        /// Encoding name
        name: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedEncodingPair { from, to, unknown } => {
                let side = match unknown {
                    UnknownSide::From => format!("unknown source encoding {}", from),
                    UnknownSide::To => format!("unknown target encoding {}", to),
                    UnknownSide::Both => "both encodings unknown".to_string(),
                };
                write!(f, "Unsupported conversion from {} to {}: {}", from, to, side)
            }
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::MalformedInput { encoding, offset } => {
                write!(f, "Malformed {} input ending at byte {}", encoding, offset)
            }
            Error::UnmappableCharacter {
                encoding,
                character,
                offset,
            } => write!(
                f,
                "Cannot encode character '{}' (U+{:04X}) in {} ending at byte {}",
                character, *character as u32, encoding, offset
            ),
            Error::NotText {
                encoding,
                valid_up_to,
            } => write!(
                f,
                "{} output is not UTF-8 text after byte {}",
                encoding, valid_up_to
            ),
            Error::DuplicateRegistration { from, to } => {
                write!(f, "Conversion from {} to {} registered twice", from, to)
            }
            Error::SelfRegistration { name } => {
                write!(f, "Cannot register a conversion from {} to itself", name)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::Io(err),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Whether `err` carries a conversion fault rather than a failure of the source
pub(crate) fn is_conversion_fault(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<Error>())
}

/// Names of all built-in encodings, sorted
pub fn supported_encodings() -> Vec<&'static str> {
    Registry::global().encodings().into_iter().collect()
}

/// Convert `input` from `from` to `to` with default options
///
/// Same as [`Converter::new`] followed by [`Converter::convert_bytes`].
pub fn convert_bytes(input: &[u8], from: &str, to: &str) -> Result<Vec<u8>> {
    Converter::new(from, to)?.convert_bytes(input)
}

/// Convert `input` from `from` to `to` and return the result as text
///
/// Same as [`Converter::new`] followed by [`Converter::convert_text`].
pub fn convert_text<T: AsRef<[u8]> + ?Sized>(input: &T, from: &str, to: &str) -> Result<String> {
    Converter::new(from, to)?.convert_text(input)
}

/// Wrap `input` in a reader converting from `from` to `to`
///
/// Same as [`Converter::new`] followed by [`Converter::convert_stream`].
pub fn convert_stream<R: Read>(input: R, from: &str, to: &str) -> Result<ConvertReader<R>> {
    Ok(Converter::new(from, to)?.convert_stream(input))
}
