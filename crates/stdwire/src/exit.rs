use std::fmt;
use std::io;

use stdwire_channel::ChannelError;
use stdwire_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. } | FrameError::InvalidText { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::InvalidDelimiter(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Frame(err) => frame_error(context, err),
        ChannelError::Envelope(_) | ChannelError::CorrelationMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Disconnected(_) | ChannelError::HandshakeMissing(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}
