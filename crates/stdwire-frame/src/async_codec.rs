//! `tokio_util::codec` adapter for the delimiter framing.
//!
//! Splits with the same rules as [`FrameReader`](crate::FrameReader), so a
//! tokio parent can drive a blocking worker through `FramedRead`/`FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

/// Codec that yields complete [`Frame`]s and encodes bodies with their
/// delimiter line.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    decoder: FrameDecoder,
    config: FrameConfig,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::build(FrameConfig::default())
    }
}

impl MessageCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(&config),
            config,
        }
    }

    /// Codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for MessageCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decoder.decode(src)? {
            return Ok(Some(frame));
        }
        let discarded = self.decoder.pending_len(src);
        if discarded > 0 {
            tracing::debug!(discarded, "stream closed with an unterminated frame");
        }
        src.clear();
        Ok(None)
    }
}

impl Encoder<&str> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, body: &str, dst: &mut BytesMut) -> Result<()> {
        encode_frame(body, &self.config, dst);
        Ok(())
    }
}
