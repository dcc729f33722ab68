//! The DNS traffic aggregator: one [`CounterTable`] per dimension plus the
//! scalar protocol counters, fed one [`DnsEvent`] at a time.

use std::fmt;
use std::net::Ipv4Addr;

use log::trace;

use super::classify::LocalNet;
use super::labels::{decompose, truncate_key};
use super::summary::{render_key, Dimension};
use super::table::{CounterEntry, CounterTable};
use crate::geo::GeoResolver;
use crate::packet::{qtype_name, rcode, DnsEvent, DNS_HEADER_LEN};

/// Default capacity of every table.
pub const DEFAULT_TABLE_SIZE: usize = 10_000;

/// How the aggregator is sized and which network counts as local.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub local_net: LocalNet,
    pub table_size: usize,
    /// Per-dimension capacities that win over `table_size`.
    pub table_size_overrides: Vec<(Dimension, usize)>,
}

impl ContextConfig {
    pub fn new(local_net: LocalNet) -> Self {
        Self {
            local_net,
            ..Self::default()
        }
    }

    /// Capacity for `dimension`; the last override given for it wins.
    pub fn capacity(&self, dimension: Dimension) -> usize {
        self.table_size_overrides
            .iter()
            .rev()
            .find(|(dim, _)| *dim == dimension)
            .map(|(_, size)| *size)
            .unwrap_or(self.table_size)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            local_net: LocalNet::ANY,
            table_size: DEFAULT_TABLE_SIZE,
            table_size_overrides: Vec::new(),
        }
    }
}

/// Scalar counters, copied out whole for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsCounters {
    pub seen: u64,
    pub incoming: u64,
    pub query: u64,
    pub reply: u64,
    pub noerror: u64,
    pub srvfail: u64,
    pub nxdomain: u64,
    pub refused: u64,
    pub malformed: u64,
    pub edns: u64,
}

impl DnsCounters {
    pub fn outgoing(&self) -> u64 {
        self.seen.saturating_sub(self.incoming)
    }
}

impl fmt::Display for DnsCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "seen: {}  incoming: {}  outgoing: {}",
            self.seen,
            self.incoming,
            self.outgoing()
        )?;
        writeln!(
            f,
            "query: {}  reply: {}  malformed: {}  edns: {}",
            self.query, self.reply, self.malformed, self.edns
        )?;
        write!(
            f,
            "noerror: {}  srvfail: {}  nxdomain: {}  refused: {}",
            self.noerror, self.srvfail, self.nxdomain, self.refused
        )
    }
}

/// Aggregated view of all DNS traffic seen so far.
///
/// Owned by the ingestion loop and mutated only through [`update`](Self::update).
pub struct DnsTrafficContext {
    local_net: LocalNet,
    counters: DnsCounters,

    sources: CounterTable<Ipv4Addr>,
    destinations: CounterTable<Ipv4Addr>,
    malformed: CounterTable<Ipv4Addr>,
    source_ports: CounterTable<u16>,
    query2: CounterTable<String>,
    query3: CounterTable<String>,
    nxdomain: CounterTable<String>,
    refused: CounterTable<String>,
    query_types: CounterTable<String>,
    geo: CounterTable<String>,
    asn: CounterTable<String>,

    geo_resolver: Option<Box<dyn GeoResolver>>,
}

impl DnsTrafficContext {
    pub fn new(config: &ContextConfig) -> Self {
        let cap = |dim| config.capacity(dim);
        Self {
            local_net: config.local_net,
            counters: DnsCounters::default(),
            sources: CounterTable::new(cap(Dimension::Sources)),
            destinations: CounterTable::new(cap(Dimension::Destinations)),
            malformed: CounterTable::new(cap(Dimension::Malformed)),
            source_ports: CounterTable::new(cap(Dimension::SourcePorts)),
            query2: CounterTable::new(cap(Dimension::Query2)),
            query3: CounterTable::new(cap(Dimension::Query3)),
            nxdomain: CounterTable::new(cap(Dimension::Nxdomain)),
            refused: CounterTable::new(cap(Dimension::Refused)),
            query_types: CounterTable::new(cap(Dimension::QueryTypes)),
            geo: CounterTable::new(cap(Dimension::Geo)),
            asn: CounterTable::new(cap(Dimension::Asn)),
            geo_resolver: None,
        }
    }

    /// Enables the geo and ASN dimensions.
    pub fn with_geo_resolver(mut self, resolver: Box<dyn GeoResolver>) -> Self {
        self.geo_resolver = Some(resolver);
        self
    }

    pub fn local_net(&self) -> LocalNet {
        self.local_net
    }

    pub fn counters(&self) -> DnsCounters {
        self.counters
    }

    pub fn has_geo(&self) -> bool {
        self.geo_resolver.is_some()
    }

    /// Accounts for one DNS packet. Never fails: bad input is counted and
    /// processing of the event stops.
    pub fn update(&mut self, event: &DnsEvent) {
        let c = &mut self.counters;
        c.seen += 1;

        let incoming = self.local_net.contains(event.dest_addr);
        if incoming {
            c.incoming += 1;
        }

        let header = match event.header {
            Some(header) if event.payload_len >= DNS_HEADER_LEN => header,
            _ => {
                trace!("short DNS payload ({} bytes) from {}", event.payload_len, event.src_addr);
                c.malformed += 1;
                if incoming {
                    self.malformed.touch(&event.src_addr);
                }
                return;
            }
        };

        if incoming {
            self.sources.touch(&event.src_addr);
            self.source_ports.touch(&event.src_port);
            if header.is_reply() {
                // we answer queries, we don't get answers
                c.malformed += 1;
                self.malformed.touch(&event.src_addr);
            }
        } else {
            self.destinations.touch(&event.dest_addr);
        }

        if header.is_reply() {
            c.reply += 1;
        } else {
            c.query += 1;
        }

        let outgoing_reply = !incoming && header.is_reply();
        if outgoing_reply {
            match header.rcode {
                rcode::NOERROR => c.noerror += 1,
                rcode::SERVFAIL => c.srvfail += 1,
                rcode::NXDOMAIN => c.nxdomain += 1,
                rcode::REFUSED => c.refused += 1,
                _ => {}
            }
        }

        if let Some(question) = &event.question {
            if incoming {
                let suffixes = decompose(truncate_key(&question.name));
                self.query2.touch(suffixes.suffix2.as_str());
                self.query3.touch(suffixes.suffix3.as_str());
                self.query_types.touch(&*qtype_name(question.qtype));
            }

            if outgoing_reply {
                let table = match header.rcode {
                    rcode::NXDOMAIN => Some(&mut self.nxdomain),
                    rcode::REFUSED => Some(&mut self.refused),
                    _ => None,
                };
                if let Some(table) = table {
                    let lowered = question.name.to_ascii_lowercase();
                    let full = lowered.strip_suffix('.').unwrap_or(&lowered);
                    table.touch(truncate_key(full));
                }
            }
        }

        if event.has_edns {
            self.counters.edns += 1;
        }

        if incoming {
            if let Some(resolver) = &self.geo_resolver {
                let labels = resolver.resolve(event.src_addr);
                if let Some(location) = labels.location {
                    self.geo.touch(truncate_key(&location));
                }
                if let Some(asn) = labels.asn {
                    self.asn.touch(truncate_key(&asn));
                }
            }
        }
    }

    /// Top `n` rows of one dimension, keys rendered for display.
    pub fn top(&self, dimension: Dimension, n: usize) -> Vec<CounterEntry<String>> {
        fn rendered<K: Clone + Eq + Ord + std::hash::Hash + fmt::Display>(
            table: &CounterTable<K>,
            n: usize,
        ) -> Vec<CounterEntry<String>> {
            table
                .top_n(n)
                .into_iter()
                .map(|e| CounterEntry {
                    key: render_key(&e.key),
                    count: e.count,
                })
                .collect()
        }

        match dimension {
            Dimension::Sources => rendered(&self.sources, n),
            Dimension::Destinations => rendered(&self.destinations, n),
            Dimension::Malformed => rendered(&self.malformed, n),
            Dimension::SourcePorts => rendered(&self.source_ports, n),
            Dimension::Query2 => rendered(&self.query2, n),
            Dimension::Query3 => rendered(&self.query3, n),
            Dimension::Nxdomain => rendered(&self.nxdomain, n),
            Dimension::Refused => rendered(&self.refused, n),
            Dimension::QueryTypes => rendered(&self.query_types, n),
            Dimension::Geo => rendered(&self.geo, n),
            Dimension::Asn => rendered(&self.asn, n),
        }
    }

    /// Number of keys currently held for `dimension`.
    pub fn table_len(&self, dimension: Dimension) -> usize {
        match dimension {
            Dimension::Sources => self.sources.len(),
            Dimension::Destinations => self.destinations.len(),
            Dimension::Malformed => self.malformed.len(),
            Dimension::SourcePorts => self.source_ports.len(),
            Dimension::Query2 => self.query2.len(),
            Dimension::Query3 => self.query3.len(),
            Dimension::Nxdomain => self.nxdomain.len(),
            Dimension::Refused => self.refused.len(),
            Dimension::QueryTypes => self.query_types.len(),
            Dimension::Geo => self.geo.len(),
            Dimension::Asn => self.asn.len(),
        }
    }

    /// Resets every counter and empties every table.
    pub fn clear(&mut self) {
        self.counters = DnsCounters::default();
        self.sources.clear();
        self.destinations.clear();
        self.malformed.clear();
        self.source_ports.clear();
        self.query2.clear();
        self.query3.clear();
        self.nxdomain.clear();
        self.refused.clear();
        self.query_types.clear();
        self.geo.clear();
        self.asn.clear();
    }
}

impl fmt::Debug for DnsTrafficContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsTrafficContext")
            .field("local_net", &self.local_net)
            .field("counters", &self.counters)
            .field("geo", &self.geo_resolver.is_some())
            .finish_non_exhaustive()
    }
}
