//! The resumable, one-directional byte transform that every codec implements
//!
//! A [`Transform`] is fed input in arbitrary slices and writes into a caller-owned
//! output buffer. It never allocates per call and keeps only the state it needs to
//! resume a multi-byte sequence that was split across two reads.

use std::fmt;
use std::sync::Arc;

use encoding_rs::EncoderResult;
use serde::{Deserialize, Serialize};

/// Code point substituted for a malformed input sequence when decoding
pub const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Text substituted for an unmappable character when encoding
pub const SUBSTITUTE: &str = "?";

/// How a transform reacts to input it cannot convert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Substitute a placeholder and keep going
    #[default]
    Replace,
    /// Stop at the first malformed or unmappable unit
    Strict,
}

/// Why a call to [`Transform::transform`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Everything that can be processed so far was consumed.
    ///
    /// Without `last`, an incomplete trailing sequence may be left unconsumed.
    InputEmpty,
    /// The output buffer has no room for the next unit
    OutputFull,
    /// A malformed input sequence was found (strict mode only)
    Malformed,
    /// A character has no representation in the output encoding (strict mode only)
    Unmappable(char),
}

/// Progress report of a single [`Transform::transform`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Why the call returned
    pub status: Status,
    /// Bytes consumed from the input slice
    pub read: usize,
    /// Bytes written to the output slice
    pub written: usize,
}

impl Step {
    /// Create a progress report
    pub fn new(status: Status, read: usize, written: usize) -> Self {
        Self {
            status,
            read,
            written,
        }
    }
}

/// A stateful conversion from bytes in one encoding to bytes in another
///
/// Implementations must make progress whenever `dst` has room for at least one
/// output unit, and must flush any pending state once called with `last` set.
pub trait Transform: Send {
    /// Convert as much of `src` into `dst` as possible
    fn transform(&mut self, src: &[u8], dst: &mut [u8], last: bool) -> Step;
}

/// Supplier of the canonical-bound transforms for one encoding
pub trait Codec: Send + Sync {
    /// Transform from this encoding to UTF-8
    fn new_decoder(&self, mode: ErrorMode) -> Box<dyn Transform>;

    /// Transform from UTF-8 to this encoding
    fn new_encoder(&self, mode: ErrorMode) -> Box<dyn Transform>;
}

/// Shareable constructor of fresh [`Transform`] instances
///
/// Registries hold factories rather than transforms, so every conversion gets its
/// own execution state.
#[derive(Clone)]
pub struct TransformFactory(Arc<dyn Fn(ErrorMode) -> Box<dyn Transform> + Send + Sync>);

impl TransformFactory {
    /// Wrap a constructor closure
    pub fn new<F>(make: F) -> Self
    where
        F: Fn(ErrorMode) -> Box<dyn Transform> + Send + Sync + 'static,
    {
        Self(Arc::new(make))
    }

    /// Factory producing the decoder of `codec`
    pub fn decoder(codec: Arc<dyn Codec>) -> Self {
        Self::new(move |mode| codec.new_decoder(mode))
    }

    /// Factory producing the encoder of `codec`
    pub fn encoder(codec: Arc<dyn Codec>) -> Self {
        Self::new(move |mode| codec.new_encoder(mode))
    }

    /// Build a new transform with its own state
    pub fn instantiate(&self, mode: ErrorMode) -> Box<dyn Transform> {
        (self.0)(mode)
    }
}

impl fmt::Debug for TransformFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransformFactory")
    }
}

/// Encoder working on already validated text
///
/// Same contract as `encoding_rs::Encoder::encode_from_utf8_without_replacement`:
/// on `Unmappable(c)` the character `c` counts as read.
pub trait EncodeStr: Send {
    /// Encode as much of `src` into `dst` as possible
    fn encode_str(&mut self, src: &str, dst: &mut [u8], last: bool) -> (EncoderResult, usize, usize);
}

impl EncodeStr for encoding_rs::Encoder {
    fn encode_str(&mut self, src: &str, dst: &mut [u8], last: bool) -> (EncoderResult, usize, usize) {
        self.encode_from_utf8_without_replacement(src, dst, last)
    }
}

/// Byte-level [`Transform`] over an [`EncodeStr`]
///
/// Takes raw UTF-8, holds back characters split across reads, and applies the
/// [`ErrorMode`] to malformed UTF-8 and unmappable characters.
pub struct Utf8Encoder<E> {
    inner: E,
    mode: ErrorMode,
    substitute_pending: bool,
}

impl<E: EncodeStr> Utf8Encoder<E> {
    /// Wrap a text encoder
    pub fn new(inner: E, mode: ErrorMode) -> Self {
        Self {
            inner,
            mode,
            substitute_pending: false,
        }
    }
}

impl<E: EncodeStr> Transform for Utf8Encoder<E> {
    fn transform(&mut self, src: &[u8], dst: &mut [u8], last: bool) -> Step {
        let mut read = 0;
        let mut written = 0;
        // valid run starting at `run_start`, revalidated only past an invalid sequence
        let mut run_start = 0;
        let (mut text, mut invalid) = valid_utf8_prefix(src);

        loop {
            if self.substitute_pending {
                let (result, _, n) = self.inner.encode_str(SUBSTITUTE, &mut dst[written..], false);
                if result != EncoderResult::InputEmpty {
                    return Step::new(Status::OutputFull, read, written);
                }
                written += n;
                self.substitute_pending = false;
            }

            let pending = &text[read - run_start..];
            let whole = invalid.is_none() && run_start + text.len() == src.len();
            let (result, r, w) = self.inner.encode_str(pending, &mut dst[written..], last && whole);
            read += r;
            written += w;

            match result {
                EncoderResult::OutputFull => return Step::new(Status::OutputFull, read, written),
                EncoderResult::Unmappable(c) => {
                    if self.mode == ErrorMode::Strict {
                        return Step::new(Status::Unmappable(c), read, written);
                    }
                    self.substitute_pending = true;
                }
                EncoderResult::InputEmpty => {
                    if whole {
                        return Step::new(Status::InputEmpty, read, written);
                    }
                    let bad = match invalid {
                        Some(len) => len,
                        // a character cut off by the end of this slice
                        None if !last => return Step::new(Status::InputEmpty, read, written),
                        None => src.len() - read,
                    };
                    read += bad;
                    if self.mode == ErrorMode::Strict {
                        return Step::new(Status::Malformed, read, written);
                    }
                    self.substitute_pending = true;
                    run_start = read;
                    (text, invalid) = valid_utf8_prefix(&src[read..]);
                }
            }
        }
    }
}

/// Longest valid UTF-8 prefix of `src`, plus the length of the invalid sequence
/// right after it. `None` means `src` ends with (at most) an incomplete character.
pub(crate) fn valid_utf8_prefix(src: &[u8]) -> (&str, Option<usize>) {
    match std::str::from_utf8(src) {
        Ok(text) => (text, None),
        Err(err) => {
            let text = std::str::from_utf8(&src[..err.valid_up_to()]).unwrap_or_default();
            (text, err.error_len())
        }
    }
}

/// Write `c` as UTF-8 if it fits
#[inline]
pub(crate) fn push_char(dst: &mut [u8], c: char) -> Option<usize> {
    let len = c.len_utf8();
    if dst.len() < len {
        return None;
    }
    c.encode_utf8(&mut dst[..len]);
    Some(len)
}
