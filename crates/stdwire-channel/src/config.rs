use stdwire_envelope::ContentKey;
use stdwire_frame::{Charset, FrameConfig};

/// Which side of the protocol a channel plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Plain request/response loop.
    #[default]
    Bridge,
    /// Like `Bridge`, but announces itself with `#proc-alive` before the loop.
    Worker,
}

/// Channel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Bridge or worker behavior. Default: bridge.
    pub mode: Mode,
    /// Framing of both directions.
    pub frame: FrameConfig,
    /// Wire name of the response payload. Default: `content`.
    pub content_key: ContentKey,
}

impl ChannelConfig {
    /// Default bridge configuration.
    pub fn bridge() -> Self {
        Self::default()
    }

    /// Default worker configuration.
    pub fn worker() -> Self {
        Self::default().with_mode(Mode::Worker)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.frame.charset = charset;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.frame.delimiter = delimiter.into();
        self
    }

    /// Older worker peers expect `data` instead of `content`.
    pub fn with_content_key(mut self, content_key: ContentKey) -> Self {
        self.content_key = content_key;
        self
    }
}
