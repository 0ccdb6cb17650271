//! Relay backend client and poll loop.
//!
//! This crate owns the backend wire contract (commands, mapping, template,
//! results) and the loop that feeds fetched batches into an interpreter.
//!
//! Blocking I/O on a plain worker thread. No async runtime.

mod client;
mod context;
mod poller;

pub use client::{first_success, RelayClient, RelayError};
pub use context::{InitReport, RelayContext};
pub use poller::{CommandSink, PollConfig, PollLoop, PollStats, TickOutcome};
