use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes delimiter-terminated frames to any `Write` stream.
///
/// Every frame goes out in a single buffered write followed by a flush, so
/// the peer never observes half a frame sitting in a local buffer.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::build(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(inner, config))
    }

    fn build(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a body followed by its delimiter line (blocking).
    pub fn write_frame(&mut self, body: &str) -> Result<()> {
        self.buf.clear();
        encode_frame(body, &self.config, &mut self.buf);
        self.write_buffered()
    }

    /// Write text as-is, without a delimiter line.
    ///
    /// Used for one-off markers such as the worker handshake.
    pub fn write_marker(&mut self, marker: &str) -> Result<()> {
        self.buf.clear();
        self.buf
            .extend_from_slice(&self.config.charset.encode(marker));
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
