use std::borrow::Cow;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::charset::Charset;
use crate::error::{FrameError, Result};

/// Line that terminates every message body.
pub const MESSAGE_DELIMITER: &str = "#msg-end";

/// Unframed marker a worker writes once when it starts listening.
pub const PROCESS_ALIVE: &str = "#proc-alive";

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// One complete message body, without the terminating delimiter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw body bytes in the channel charset.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Decode the body as text.
    pub fn text(&self, charset: Charset) -> Result<Cow<'_, str>> {
        charset.decode(&self.body)
    }
}

/// Configuration shared by frame readers, writers and decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Delimiter line. Default: `#msg-end`.
    pub delimiter: String,
    /// Charset of frame bodies. Default: UTF-8.
    pub charset: Charset,
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            delimiter: MESSAGE_DELIMITER.to_string(),
            charset: Charset::Utf8,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl FrameConfig {
    /// Check that the delimiter can be matched as a line on raw bytes.
    pub fn validate(&self) -> Result<()> {
        let delimiter = &self.delimiter;
        if delimiter.is_empty()
            || !delimiter.is_ascii()
            || delimiter.contains(['\n', '\r'])
        {
            return Err(FrameError::InvalidDelimiter(delimiter.clone()));
        }
        Ok(())
    }

    /// Byte sequence that ends a body: a line break followed by the delimiter.
    pub fn terminator(&self) -> Vec<u8> {
        let mut terminator = Vec::with_capacity(self.delimiter.len() + 1);
        terminator.push(b'\n');
        terminator.extend_from_slice(self.delimiter.as_bytes());
        terminator
    }
}

/// Encode a body followed by its delimiter line.
///
/// Wire format:
/// ```text
/// <body in charset> \n <delimiter> \n
/// ```
pub fn encode_frame(body: &str, config: &FrameConfig, dst: &mut BytesMut) {
    let encoded = config.charset.encode(body);
    dst.reserve(encoded.len() + config.delimiter.len() + 2);
    dst.put_slice(&encoded);
    dst.put_u8(b'\n');
    dst.put_slice(config.delimiter.as_bytes());
    dst.put_u8(b'\n');
}

/// Incremental splitter over an accumulating byte buffer.
///
/// The line break after a matched terminator is dropped lazily from the
/// front of the next body, so a frame is handed out as soon as its delimiter
/// arrives even when the trailing newline is still in flight.
///
/// A body that outgrows `max_frame_size` is dropped as it arrives. Once its
/// terminator shows up, `decode` returns [`FrameError::FrameTooLarge`] for
/// that frame and the decoder carries on with the next one.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    terminator: Vec<u8>,
    max_frame_size: usize,
    strip_line_break: bool,
    scanned: usize,
    // Bytes already dropped from an oversized body.
    discarded: Option<usize>,
}

impl FrameDecoder {
    /// Create a decoder for the given configuration.
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            terminator: config.terminator(),
            max_frame_size: config.max_frame_size,
            strip_line_break: false,
            scanned: 0,
            discarded: None,
        }
    }

    /// Decode the next frame from `src`.
    ///
    /// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
    /// On success, consumes the body and its terminator from the buffer.
    ///
    /// [`FrameError::FrameTooLarge`] is reported once per oversized frame,
    /// after its terminator was consumed; the decoder stays usable.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.strip_line_break {
            match src.first() {
                None => return Ok(None),
                Some(b'\n') => src.advance(1),
                Some(b'\r') => {
                    if src.len() < 2 {
                        return Ok(None); // Need more data
                    }
                    if src[1] == b'\n' {
                        src.advance(2);
                    }
                }
                Some(_) => {}
            }
            self.strip_line_break = false;
            self.scanned = 0;
        }

        let start = self.scanned.min(src.len());
        let found = src[start..]
            .windows(self.terminator.len())
            .position(|window| window == self.terminator.as_slice());

        let Some(offset) = found else {
            // A terminator may straddle the next read; rescan its prefix.
            let settled = src.len().saturating_sub(self.terminator.len() - 1);
            if self.discarded.is_some() || settled > self.max_frame_size {
                self.discard_pending(src);
                return Ok(None);
            }
            self.scanned = settled;
            return Ok(None); // Need more data
        };

        let end = start + offset;
        if let Some(dropped) = self.discarded.take() {
            return Err(self.skip_oversized(src, end, dropped + end));
        }
        if end > self.max_frame_size {
            return Err(self.skip_oversized(src, end, end));
        }

        let body = src.split_to(end).freeze();
        src.advance(self.terminator.len());
        self.strip_line_break = true;
        self.scanned = 0;

        Ok(Some(Frame { body }))
    }

    // Drop everything except a possible terminator prefix at the tail.
    fn discard_pending(&mut self, src: &mut BytesMut) {
        let drop = src.len().saturating_sub(self.terminator.len() - 1);
        src.advance(drop);
        let dropped = self.discarded.unwrap_or(0) + drop;
        if self.discarded.is_none() {
            tracing::debug!(max = self.max_frame_size, "frame exceeds limit, discarding");
        }
        self.discarded = Some(dropped);
        self.scanned = 0;
    }

    fn skip_oversized(&mut self, src: &mut BytesMut, end: usize, size: usize) -> FrameError {
        src.advance(end + self.terminator.len());
        self.strip_line_break = true;
        self.scanned = 0;
        FrameError::FrameTooLarge {
            size,
            max: self.max_frame_size,
        }
    }

    /// Bytes in `src` that belong to an unterminated body.
    ///
    /// A lone line break left over from the previous terminator is not
    /// counted.
    pub fn pending_len(&self, src: &BytesMut) -> usize {
        if let Some(dropped) = self.discarded {
            return dropped + src.len();
        }
        if self.strip_line_break {
            match src.as_ref() {
                b"\r" | b"\n" | b"\r\n" => return 0,
                _ => {}
            }
        }
        src.len()
    }
}
