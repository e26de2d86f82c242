//! Streaming execution of a [`ConversionPath`]
//!
//! Each stage is a [`TransformReader`] pulling from the reader below it, so a
//! bridged conversion is two readers stacked on the source. Nothing is read from
//! the source until the first call to `read`.

use std::io::{self, Read};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::registry::{ConversionPath, Stage};
use crate::transform::{ErrorMode, Status, Transform};
use crate::{Error, is_conversion_fault};

/// Default size of each stage buffer
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Smallest stage buffer; large enough for any pending sequence plus one output unit
pub const MIN_BUFFER_SIZE: usize = 64;

/// One conversion stage as an [`io::Read`] adapter
pub struct TransformReader<R> {
    inner: R,
    transform: Box<dyn Transform>,
    input: Arc<str>,
    output: Arc<str>,

    src: Box<[u8]>,
    src_start: usize,
    src_end: usize,
    dst: Box<[u8]>,
    dst_start: usize,
    dst_end: usize,

    /// Input bytes consumed by the transform so far
    consumed: u64,
    produced: u64,
    needs_input: bool,
    eof: bool,
    finished: bool,
    fault: Option<Error>,
}

impl<R: Read> TransformReader<R> {
    /// Run the transform of `stage` over everything `inner` yields
    pub fn new(inner: R, stage: &Stage, mode: ErrorMode, buffer_size: usize) -> Self {
        let size = buffer_size.max(MIN_BUFFER_SIZE);
        Self {
            inner,
            transform: stage.factory().instantiate(mode),
            input: stage.from_encoding().into(),
            output: stage.to_encoding().into(),
            src: vec![0; size].into_boxed_slice(),
            src_start: 0,
            src_end: 0,
            dst: vec![0; size].into_boxed_slice(),
            dst_start: 0,
            dst_end: 0,
            consumed: 0,
            produced: 0,
            needs_input: false,
            eof: false,
            finished: false,
            fault: None,
        }
    }

    /// Encoding of the bytes read from the inner reader
    pub fn input_encoding(&self) -> &str {
        &self.input
    }

    /// Encoding of the bytes this reader yields
    pub fn output_encoding(&self) -> &str {
        &self.output
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.src_start > 0 {
            self.src.copy_within(self.src_start..self.src_end, 0);
            self.src_end -= self.src_start;
            self.src_start = 0;
        }
        if self.src_end == self.src.len() {
            return Ok(());
        }

        let n = match self.inner.read(&mut self.src[self.src_end..]) {
            Ok(n) => n,
            Err(err) => {
                if is_conversion_fault(&err) {
                    self.finished = true;
                }
                return Err(err);
            }
        };
        if n == 0 {
            self.eof = true;
        }
        self.src_end += n;
        self.needs_input = false;
        Ok(())
    }

    /// Run the transform once, leaving output or a fault behind
    fn step(&mut self) -> io::Result<()> {
        if !self.eof && (self.needs_input || self.src_start == self.src_end) {
            self.fill()?;
        }

        let last = self.eof;
        let step = self
            .transform
            .transform(&self.src[self.src_start..self.src_end], &mut self.dst, last);
        self.src_start += step.read;
        self.consumed += step.read as u64;
        self.produced += step.written as u64;
        self.dst_start = 0;
        self.dst_end = step.written;

        match step.status {
            Status::InputEmpty if last => self.finish(),
            Status::InputEmpty => self.needs_input = self.src_start < self.src_end,
            Status::OutputFull => {}
            Status::Malformed => {
                debug!(encoding = %self.input, offset = self.consumed, "malformed input");
                self.fault = Some(Error::MalformedInput {
                    encoding: self.input.to_string(),
                    offset: self.consumed,
                });
            }
            Status::Unmappable(character) => {
                debug!(encoding = %self.output, ?character, offset = self.consumed, "unmappable character");
                self.fault = Some(Error::UnmappableCharacter {
                    encoding: self.output.to_string(),
                    character,
                    offset: self.consumed,
                });
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
        trace!(
            from = %self.input,
            to = %self.output,
            read = self.consumed,
            written = self.produced,
            "conversion stage finished"
        );
    }
}

impl<R: Read> Read for TransformReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.dst_start < self.dst_end {
                let n = buf.len().min(self.dst_end - self.dst_start);
                buf[..n].copy_from_slice(&self.dst[self.dst_start..self.dst_start + n]);
                self.dst_start += n;
                return Ok(n);
            }
            if let Some(fault) = self.fault.take() {
                self.finished = true;
                return Err(fault.into());
            }
            if self.finished {
                return Ok(0);
            }
            self.step()?;
        }
    }
}

enum Route<R> {
    Identity(R),
    Direct(TransformReader<R>),
    Bridged(TransformReader<TransformReader<R>>),
}

/// Lazily converted byte stream returned by [`apply`]
///
/// Read errors of the source are passed through unchanged. Conversion faults
/// surface as [`io::ErrorKind::InvalidData`] wrapping an [`Error`]; convert with
/// `Error::from` to get it back.
pub struct ConvertReader<R> {
    route: Route<R>,
}

impl<R: Read> Read for ConvertReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.route {
            Route::Identity(reader) => reader.read(buf),
            Route::Direct(reader) => reader.read(buf),
            Route::Bridged(reader) => reader.read(buf),
        }
    }
}

/// Stack the stages of `path` on top of `input`
pub fn apply<R: Read>(
    path: &ConversionPath,
    input: R,
    mode: ErrorMode,
    buffer_size: usize,
) -> ConvertReader<R> {
    let route = match path {
        ConversionPath::Identity => Route::Identity(input),
        ConversionPath::Direct(stage) => {
            Route::Direct(TransformReader::new(input, stage, mode, buffer_size))
        }
        ConversionPath::Bridged { decode, encode } => {
            let decoded = TransformReader::new(input, decode, mode, buffer_size);
            Route::Bridged(TransformReader::new(decoded, encode, mode, buffer_size))
        }
    };
    ConvertReader { route }
}
