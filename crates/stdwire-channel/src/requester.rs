use std::io::{Read, Write};

use stdwire_envelope::{decode_response, encode_request, ContentKey, Request, Response};
use stdwire_frame::{FrameReader, FrameWriter, PROCESS_ALIVE};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

/// Parent side of a channel: writes requests to a worker and reads its
/// responses, one at a time.
pub struct Requester<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    content_key: ContentKey,
}

impl<R: Read, W: Write> Requester<R, W> {
    /// Create a requester reading responses from `source` and writing
    /// requests to `target`.
    pub fn new(source: R, target: W) -> Self {
        Self {
            reader: FrameReader::new(source),
            writer: FrameWriter::new(target),
            content_key: ContentKey::default(),
        }
    }

    /// Create a requester with explicit configuration. `config.mode` is not
    /// used; call [`await_alive`](Self::await_alive) for worker peers.
    pub fn with_config(source: R, target: W, config: &ChannelConfig) -> Result<Self> {
        Ok(Self {
            reader: FrameReader::with_config(source, config.frame.clone())?,
            writer: FrameWriter::with_config(target, config.frame.clone())?,
            content_key: config.content_key,
        })
    }

    /// Consume the worker handshake. Blocks until the worker writes it.
    pub fn await_alive(&mut self) -> Result<()> {
        if self.reader.read_marker(PROCESS_ALIVE)? {
            tracing::debug!("worker is alive");
            Ok(())
        } else {
            Err(ChannelError::HandshakeMissing(PROCESS_ALIVE.to_string()))
        }
    }

    /// Write one request frame.
    pub fn send(&mut self, request: &Request) -> Result<()> {
        let body = encode_request(request, self.content_key)?;
        self.writer.write_frame(&body)?;
        tracing::debug!(id = ?request.id(), "request sent");
        Ok(())
    }

    /// Read the next response frame.
    pub fn recv(&mut self) -> Result<Response> {
        let frame = self
            .reader
            .read_frame()?
            .ok_or_else(|| ChannelError::Disconnected("worker closed its output".to_string()))?;
        let text = frame.text(self.reader.config().charset)?;
        Ok(decode_response(&text)?)
    }

    /// Send `request` and wait for its response.
    ///
    /// A response without an id is accepted, since that is how a worker
    /// answers a request it could not parse.
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        self.send(request)?;
        let response = self.recv()?;
        if response.id().is_some() && response.id() != request.id() {
            return Err(ChannelError::CorrelationMismatch {
                expected: request.id().map(str::to_string),
                received: response.id().map(str::to_string),
            });
        }
        Ok(response)
    }

    /// Consume the requester and return its streams.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}
