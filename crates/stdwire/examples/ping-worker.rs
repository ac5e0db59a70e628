//! Minimal worker: answers each request with its `operation` query parameter.
//!
//! Run with:
//!   cargo run --example ping-worker
//!
//! Or drive it from the CLI:
//!   cargo run --features cli -- call --worker -q operation=ping -- \
//!     target/debug/examples/ping-worker

use std::io;

use stdwire::channel::{handler_fn, Channel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();

    let mut channel = Channel::worker(stdin, stdout);
    let summary = channel.listen(handler_fn(|req, res| {
        match req.query_string("operation") {
            Some(operation) => {
                res.text(operation);
                Ok(())
            }
            None => Err("missing operation".into()),
        }
    }))?;

    eprintln!("handled {} requests", summary.frames);
    Ok(())
}
