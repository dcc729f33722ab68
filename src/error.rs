//! Error types for dnsvisor.
//!
//! Only configuration and start-up failures are surfaced as errors. Anything that
//! goes wrong with an individual packet is a [`DecodeError`], which the capture
//! side counts and logs but never propagates.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dnsvisor operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Local network is not a valid `a.b.c.d/len` specification
    #[error("invalid local network '{spec}': {reason}")]
    InvalidLocalNet { spec: String, reason: String },

    /// Table capacity (or a per-table override) is unusable
    #[error("invalid table size '{spec}': {reason}")]
    InvalidCapacity { spec: String, reason: String },

    /// Geo prefix table could not be parsed
    #[error("{path}:{line}: invalid geo table entry: {reason}")]
    InvalidGeoTable {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// MaxMind database could not be opened
    #[error("cannot open geo database {path}: {source}")]
    GeoDatabase {
        path: PathBuf,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// Error opening or configuring the capture source
    #[error("capture error: {0}")]
    Capture(#[from] pcap::Error),

    /// Error setting up or drawing the terminal display
    #[error("terminal error: {0}")]
    Terminal(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a captured frame could not be turned into a DNS event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Packet too short for a protocol header
    #[error("{layer}: packet too short (need {needed} bytes, have {have})")]
    TooShort {
        layer: &'static str,
        needed: usize,
        have: usize,
    },

    /// A header field carries a value that cannot be right
    #[error("{layer}: invalid {field}")]
    InvalidField {
        layer: &'static str,
        field: &'static str,
    },

    /// Link type the decoder does not understand
    #[error("unsupported link type {0}")]
    UnsupportedLinkType(i32),

    /// Question name ran past the payload or looped through pointers
    #[error("malformed question name: {0}")]
    BadName(&'static str),
}
