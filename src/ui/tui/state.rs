use std::time::{Duration, Instant};

use crate::stats::{Dimension, DnsCounters, TrafficSnapshot};

/// What the body of the screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Help,
    Summary,
    Table(Dimension),
}

impl View {
    /// View selected by a key press, case-insensitive. `None` for keys that
    /// don't switch views.
    pub fn from_key(key: char) -> Option<View> {
        let view = match key.to_ascii_lowercase() {
            '?' => View::Help,
            's' => View::Summary,
            'q' => View::Table(Dimension::QueryTypes),
            '1' => View::Table(Dimension::Query2),
            '2' => View::Table(Dimension::Query3),
            '3' => View::Table(Dimension::Sources),
            '4' => View::Table(Dimension::Destinations),
            '5' => View::Table(Dimension::Malformed),
            '6' => View::Table(Dimension::Nxdomain),
            '7' => View::Table(Dimension::Refused),
            '8' => View::Table(Dimension::SourcePorts),
            '9' => View::Table(Dimension::Geo),
            '0' => View::Table(Dimension::Asn),
            _ => return None,
        };
        Some(view)
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Help => "Help",
            View::Summary => "Summary",
            View::Table(dim) => dim.title(),
        }
    }
}

/// Per-second rates measured between two redraws.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    pub incoming: u64,
    pub outgoing: u64,
    pub query: u64,
    pub reply: u64,
    pub interval: Duration,
}

/// Remembers the counters at the previous redraw.
#[derive(Debug, Default)]
pub struct RateTracker {
    last: Option<(Instant, DnsCounters)>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rates since the previous sample. The first sample reports zeros.
    pub fn sample(&mut self, now: Instant, counters: DnsCounters) -> Rates {
        let rates = match self.last {
            Some((then, prev)) => {
                let interval = now.saturating_duration_since(then);
                let secs = interval.as_secs_f64();
                let per_sec = |current: u64, before: u64| {
                    if secs > 0.0 {
                        (current.saturating_sub(before) as f64 / secs) as u64
                    } else {
                        0
                    }
                };
                Rates {
                    incoming: per_sec(counters.incoming, prev.incoming),
                    outgoing: per_sec(counters.outgoing(), prev.outgoing()),
                    query: per_sec(counters.query, prev.query),
                    reply: per_sec(counters.reply, prev.reply),
                    interval,
                }
            }
            None => Rates::default(),
        };
        self.last = Some((now, counters));
        rates
    }
}

#[derive(Debug)]
pub struct UiState {
    pub view: View,
    /// The savefile is exhausted; the display waits for the user to leave.
    pub source_done: bool,
    pub rates: Rates,
}

impl UiState {
    pub fn new() -> Self {
        UiState {
            view: View::Summary,
            source_done: false,
            rates: Rates::default(),
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// The four header lines: totals, query/reply, rcode histogram, rates.
pub fn header_lines(snapshot: &TrafficSnapshot, rates: &Rates) -> [String; 4] {
    let c = &snapshot.counters;
    let outgoing = c.outgoing();
    [
        format!(
            "total: {:>8}  incoming: {:>8}  outgoing: {:>8}  malformed: {:>6} ({:.2}%)  edns: {:>6} ({:.2}%)  dropped: {}  | ?=help",
            c.seen,
            c.incoming,
            outgoing,
            c.malformed,
            pct(c.malformed, c.seen),
            c.edns,
            pct(c.edns, c.seen),
            snapshot.dropped
        ),
        format!(
            "query: {:>8}  reply: {:>8}  | s=summary q=qtypes 1=q2 2=q3 3=src 4=dst 5=mal 6=nx 7=ref 8=ports 9=geo 0=asn",
            c.query, c.reply
        ),
        format!(
            "NOERROR: {} ({:.2}%)  SRVFAIL: {} ({:.2}%)  NXDOMAIN: {} ({:.2}%)  REFUSED: {} ({:.2}%)",
            c.noerror,
            pct(c.noerror, outgoing),
            c.srvfail,
            pct(c.srvfail, outgoing),
            c.nxdomain,
            pct(c.nxdomain, outgoing),
            c.refused,
            pct(c.refused, outgoing)
        ),
        format!(
            "rates/s: incoming {}  outgoing {}  query {}  reply {}  (over {:.2}s)",
            rates.incoming,
            rates.outgoing,
            rates.query,
            rates.reply,
            rates.interval.as_secs_f64()
        ),
    ]
}
