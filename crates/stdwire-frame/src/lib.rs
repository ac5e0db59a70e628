//! Delimiter-terminated text framing for stdio IPC.
//!
//! Every message body is followed by a line holding only the delimiter:
//!
//! ```text
//! {"id":"a7bf6a","query":{"operation":"ping"},"content":null}
//! #msg-end
//! ```
//!
//! The reader hands out complete bodies and reports end-of-stream when the
//! source closes. Bodies are plain text in a configurable [`Charset`].

pub mod charset;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use charset::Charset;
pub use codec::{
    encode_frame, Frame, FrameConfig, FrameDecoder, DEFAULT_MAX_FRAME_SIZE, MESSAGE_DELIMITER,
    PROCESS_ALIVE,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, Frames};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
