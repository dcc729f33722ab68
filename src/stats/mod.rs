//! Aggregation engine: bounded counter tables and the per-packet bookkeeping
//! that feeds them.

pub mod classify;
pub mod context;
pub mod labels;
pub mod summary;
pub mod table;

pub use classify::{is_incoming, LocalNet};
pub use context::{ContextConfig, DnsCounters, DnsTrafficContext, DEFAULT_TABLE_SIZE};
pub use labels::{decompose, truncate_key, NameSuffixes, MAX_NAME_LEN};
pub use summary::{
    render_key, summarize, write_summary, Dimension, TableSummary, TrafficSnapshot, EMPTY_KEY,
};
pub use table::{CounterEntry, CounterTable};
