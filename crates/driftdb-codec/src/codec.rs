//! Newline-delimited JSON codec.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use driftdb_protocol::ProtocolError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// Default maximum accepted line length (16 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Codec framing one JSON document per line.
///
/// `D` is the message type produced by decoding. Any `Serialize` type can be
/// encoded, so the same codec serves both ends of a connection: the client
/// decodes `Response`s, a server decodes `Request`s.
///
/// A line that fails to parse, or exceeds the length limit, is consumed and
/// yielded as an `Err` item. The stream itself only fails on transport
/// faults, so one bad line never shifts the replies that follow it.
pub struct LineCodec<D> {
    /// Maximum line length to accept, excluding the terminator.
    max_length: usize,
    /// Index into the read buffer already scanned for a terminator.
    next_index: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    _decodes: PhantomData<fn() -> D>,
}

impl<D> LineCodec<D> {
    /// Create a codec with the default maximum line length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            _decodes: PhantomData,
        }
    }

    /// Get the maximum line length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl<D> Default for LineCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for LineCodec<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineCodec")
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl<D: DeserializeOwned> Decoder for LineCodec<D> {
    type Item = Result<D, CodecError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.discarding {
                // Skip the tail of a line already reported as too long.
                match src.iter().position(|b| *b == b'\n') {
                    Some(newline) => {
                        src.advance(newline + 1);
                        self.discarding = false;
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            let read_to = src.len().min(self.max_length.saturating_add(1));
            let Some(offset) = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
            else {
                if src.len() > self.max_length {
                    let length = src.len();
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Err(CodecError::LineTooLong {
                        length,
                        max: self.max_length,
                    })));
                }
                self.next_index = read_to;
                return Ok(None);
            };

            let newline = self.next_index + offset;
            self.next_index = 0;
            let frame = src.split_to(newline + 1);
            let mut line = &frame[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                // Blank keep-alive lines carry no message.
                continue;
            }

            tracing::trace!(length = line.len(), "decoded protocol line");
            let message = serde_json::from_slice(line)
                .map_err(|e| CodecError::Protocol(ProtocolError::from(e)));
            return Ok(Some(message));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            None if self.discarding || buf.iter().all(u8::is_ascii_whitespace) => {
                buf.clear();
                self.next_index = 0;
                self.discarding = false;
                Ok(None)
            }
            None => {
                buf.clear();
                self.next_index = 0;
                Err(CodecError::ConnectionClosed)
            }
        }
    }
}

impl<D, T: Serialize> Encoder<T> for LineCodec<D> {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        serde_json::to_writer(dst.writer(), &item).map_err(ProtocolError::from)?;
        dst.put_u8(b'\n');

        tracing::trace!(length = dst.len() - start, "encoded protocol line");
        Ok(())
    }
}
