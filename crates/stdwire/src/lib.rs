//! Framed JSON request/response IPC over a child process's stdin/stdout.
//!
//! A parent writes requests to a worker's stdin and reads responses from its
//! stdout. Each message is a JSON envelope followed by a `#msg-end` line.
//!
//! # Crate Structure
//!
//! - [`frame`]: delimiter framing over any `Read`/`Write` (async codec behind `async`)
//! - [`envelope`]: request/response envelopes and their JSON codec
//! - [`channel`]: the blocking worker loop, the dispatcher and the parent-side requester

/// Re-export frame types.
pub mod frame {
    pub use stdwire_frame::*;
}

/// Re-export envelope types.
pub mod envelope {
    pub use stdwire_envelope::*;
}

/// Re-export channel types.
pub mod channel {
    pub use stdwire_channel::*;
}
