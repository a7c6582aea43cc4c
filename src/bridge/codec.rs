//! Line codec for the scan process output stream.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! producer that never emits a newline cannot make the bridge buffer
//! without bound.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
///
/// Longer lines are reported as [`AppError::Bridge`] and discarded up to
/// the next newline; decoding resumes with the following line.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited UTF-8 decoder for scan process output.
#[derive(Debug)]
pub struct EventLineCodec(LinesCodec);

impl EventLineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_length))
    }
}

impl Default for EventLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventLineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Bridge("line too long: discarded".into())
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
