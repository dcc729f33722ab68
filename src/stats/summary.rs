//! Ranked, read-only views of the aggregator for the display and the final
//! dump.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use super::context::{DnsCounters, DnsTrafficContext};
use super::table::CounterEntry;

/// Shown in place of an empty key (a query for the root, for instance).
pub const EMPTY_KEY: &str = "[empty]";

/// One counter table of the aggregator, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Sources,
    QueryTypes,
    SourcePorts,
    Destinations,
    Malformed,
    Query2,
    Query3,
    Nxdomain,
    Refused,
    Geo,
    Asn,
}

impl Dimension {
    /// Every dimension, in the order reports list them.
    pub const ALL: [Dimension; 11] = [
        Dimension::Sources,
        Dimension::QueryTypes,
        Dimension::SourcePorts,
        Dimension::Destinations,
        Dimension::Malformed,
        Dimension::Query2,
        Dimension::Query3,
        Dimension::Nxdomain,
        Dimension::Refused,
        Dimension::Geo,
        Dimension::Asn,
    ];

    /// Block heading.
    pub fn title(self) -> &'static str {
        match self {
            Dimension::Sources => "Top Source IPs",
            Dimension::QueryTypes => "Top Query Types",
            Dimension::SourcePorts => "Top Source Ports",
            Dimension::Destinations => "Top Destination IPs",
            Dimension::Malformed => "Top Malformed Query Sources",
            Dimension::Query2 => "Top 2-Label Queries",
            Dimension::Query3 => "Top 3-Label Queries",
            Dimension::Nxdomain => "Top NXDOMAIN Names",
            Dimension::Refused => "Top REFUSED Names",
            Dimension::Geo => "Top Geo Locations",
            Dimension::Asn => "Top ASNs",
        }
    }

    /// Name used on the command line (`--table-size-for name=N`).
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Sources => "sources",
            Dimension::QueryTypes => "qtypes",
            Dimension::SourcePorts => "ports",
            Dimension::Destinations => "destinations",
            Dimension::Malformed => "malformed",
            Dimension::Query2 => "query2",
            Dimension::Query3 => "query3",
            Dimension::Nxdomain => "nxdomain",
            Dimension::Refused => "refused",
            Dimension::Geo => "geo",
            Dimension::Asn => "asn",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Dimension::ALL.iter().map(|d| d.name()).collect();
                format!("unknown table '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Display form of a table key: addresses dotted-quad, ports as integers,
/// names verbatim, and empty keys as [`EMPTY_KEY`].
pub fn render_key<K: fmt::Display>(key: &K) -> String {
    let rendered = key.to_string();
    if rendered.is_empty() {
        EMPTY_KEY.to_string()
    } else {
        rendered
    }
}

/// Ranked rows of one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub dimension: Dimension,
    pub rows: Vec<CounterEntry<String>>,
}

/// Point-in-time copy of everything the display needs.
#[derive(Debug, Clone, Default)]
pub struct TrafficSnapshot {
    pub counters: DnsCounters,
    /// Events the capture side had to throw away because the queue was full.
    pub dropped: u64,
    /// A geo resolver is configured, so empty geo/ASN tables mean no data yet.
    pub geo_enabled: bool,
    pub tables: Vec<TableSummary>,
}

impl TrafficSnapshot {
    pub fn capture(ctx: &DnsTrafficContext, rows: usize, dropped: u64) -> Self {
        Self {
            counters: ctx.counters(),
            dropped,
            geo_enabled: ctx.has_geo(),
            tables: summarize(ctx, rows),
        }
    }

    pub fn table(&self, dimension: Dimension) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.dimension == dimension)
    }
}

/// Top `n` of every table, in report order. Reading never changes what the
/// tables will evict next.
pub fn summarize(ctx: &DnsTrafficContext, n: usize) -> Vec<TableSummary> {
    Dimension::ALL
        .into_iter()
        .map(|dimension| TableSummary {
            dimension,
            rows: ctx.top(dimension, n),
        })
        .collect()
}

/// Plain-text report: counters first, then one block per table.
pub fn write_summary<W: Write>(
    out: &mut W,
    ctx: &DnsTrafficContext,
    n: usize,
    dropped: u64,
) -> io::Result<()> {
    writeln!(out, "{}", ctx.counters())?;
    writeln!(out, "dropped: {}", dropped)?;

    for table in summarize(ctx, n) {
        writeln!(out)?;
        writeln!(out, "{}", table.dimension.title())?;
        if table.rows.is_empty() {
            writeln!(out, "  (no data)")?;
            continue;
        }
        let width = table.rows.iter().map(|r| r.key.len()).max().unwrap_or(0);
        for row in &table.rows {
            writeln!(out, "  {:<width$}  {}", row.key, row.count, width = width)?;
        }
    }
    out.flush()
}
