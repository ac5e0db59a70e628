use stdwire_envelope::EnvelopeError;
use stdwire_frame::FrameError;

/// Errors that can escape a channel or requester.
///
/// Protocol-level failures inside [`Channel::listen`](crate::Channel::listen)
/// are answered on the wire and never show up here; only transport failures
/// end the loop.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Frame-level error (I/O, oversize frame, bad delimiter).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Envelope encode/decode error (requester side).
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Peer closed its end before answering.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Response carries another request's id.
    #[error("response id {received:?} does not match request id {expected:?}")]
    CorrelationMismatch {
        expected: Option<String>,
        received: Option<String>,
    },

    /// Worker output did not start with the handshake marker.
    #[error("worker did not announce itself with {0:?}")]
    HandshakeMissing(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
