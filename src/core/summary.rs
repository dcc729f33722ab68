use std::io::{self, Write};

use crate::core::capture_loop::IngestStats;
use crate::stats::{write_summary, DnsTrafficContext};

/// Prints the end-of-run report to stdout.
///
/// # Arguments
///
/// * `ctx` - the aggregator, read only
/// * `ingest` - capture-side counters (dropped, skipped, undecodable)
/// * `rows` - rows per table
pub fn print_final_summary(ctx: &DnsTrafficContext, ingest: &IngestStats, rows: usize) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "\nDNS summary ({})", ctx.local_net())?;
    write_summary(&mut out, ctx, rows, ingest.dropped())?;
    writeln!(
        out,
        "\nnon-DNS frames skipped: {}  undecodable frames: {}",
        ingest.skipped(),
        ingest.decode_errors()
    )?;
    out.flush()
}
