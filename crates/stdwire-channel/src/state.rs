use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a [`Channel`](crate::Channel).
///
/// ```text
/// Idle --listen--> Listening --stop--> Stopping --loop exit--> Stopped
///                      \------------ end of stream -----------/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Listening,
    Stopping,
    Stopped,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ChannelState::Idle,
            1 => ChannelState::Listening,
            2 => ChannelState::Stopping,
            _ => ChannelState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ChannelState::Idle => 0,
            ChannelState::Listening => 1,
            ChannelState::Stopping => 2,
            ChannelState::Stopped => 3,
        }
    }

    /// Lowercase state name.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Listening => "listening",
            ChannelState::Stopping => "stopping",
            ChannelState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ChannelState::Idle.as_u8())))
    }

    pub(crate) fn load(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ChannelState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn transition(&self, from: ChannelState, to: ChannelState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Requests a stop of a listening channel from anywhere, including its own
/// handler or another thread.
///
/// A stop is observed before the next frame is read. It does not interrupt a
/// read that is already blocked; close the channel's source to guarantee the
/// loop exits.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: SharedState,
}

impl StopHandle {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Ask the loop to stop. Returns `false` if the channel was not listening,
    /// in which case nothing changes.
    pub fn stop(&self) -> bool {
        self.state
            .transition(ChannelState::Listening, ChannelState::Stopping)
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        self.state.load()
    }
}
