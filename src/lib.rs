//! Bounded-time liveness check for a fixed set of pub/sub channels.
//!
//! A run subscribes to every registered channel, waits until each one has delivered at
//! least one message (or a deadline or interrupt ends the wait), classifies every
//! channel as live or dead and reports the result to an HTTP sink.
//!
//! ## Modules
//!
//! - [`registry`]: the channels to watch
//! - [`tracker`]: concurrent arrival flags and snapshots
//! - [`scheduler`]: the bounded polling loop
//! - [`report`]: classification into a [`report::HealthReport`]
//! - [`reporter`] and [`sink`]: best-effort delivery of records
//! - [`transport`]: subscription backends
//! - [`monitor`]: one complete run

pub mod config;
pub mod console;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod scheduler;
pub mod sink;
pub mod tracker;
pub mod transport;
pub mod util;

pub use monitor::{RunOutcome, TopicMonitor};
