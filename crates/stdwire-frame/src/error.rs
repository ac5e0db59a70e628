/// Errors that can occur while splitting or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The configured delimiter cannot be matched as a line.
    #[error("invalid delimiter {0:?} (must be non-empty ASCII without line breaks)")]
    InvalidDelimiter(String),

    /// A frame body exceeded the configured maximum and was skipped.
    ///
    /// The stream stays in sync: the next read starts after the skipped frame.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame body is not valid text in the configured charset.
    #[error("frame body is not valid {charset} at byte {offset}")]
    InvalidText {
        charset: &'static str,
        offset: usize,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink stopped accepting bytes.
    #[error("connection closed (write returned zero bytes)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
