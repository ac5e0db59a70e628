//! Request/response loop over a pair of byte streams.
//!
//! A [`Channel`] reads framed JSON requests, hands each to a [`Handler`] and
//! writes one framed response back, until the source closes. A [`Requester`]
//! is the other end of the conversation.
//!
//! ```no_run
//! use stdwire_channel::{handler_fn, Channel};
//!
//! let mut channel = Channel::worker(std::io::stdin(), std::io::stdout());
//! channel.listen(handler_fn(|req, res| {
//!     res.text(req.query_string("operation").unwrap_or_default());
//!     Ok(())
//! }))?;
//! # Ok::<(), stdwire_channel::ChannelError>(())
//! ```

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod requester;
pub mod state;

pub use channel::{Channel, ListenSummary};
pub use config::{ChannelConfig, Mode};
pub use dispatcher::{
    dispatch, handler_fn, Handler, HandlerError, HandlerResult, NoHandler,
};
pub use error::{ChannelError, Result};
pub use requester::Requester;
pub use state::{ChannelState, StopHandle};
