//! dnsvisor: live DNS traffic analytics.
//!
//! Captured frames are decoded into [`packet::DnsEvent`]s, classified as
//! incoming or outgoing against the local network, and counted into bounded
//! LRU tables ([`stats::CounterTable`]) owned by a [`stats::DnsTrafficContext`].
//! Ranked snapshots of those tables feed the terminal display and the summary
//! printed at exit.

pub mod capture;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod geo;
pub mod packet;
pub mod stats;
pub mod ui;

pub use error::{DecodeError, Error, Result};
