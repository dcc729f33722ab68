//! Geo/ASN enrichment for incoming sources.
//!
//! The aggregator only sees the [`GeoResolver`] trait. Two implementations ship
//! with the binary:
//!
//! * [`MaxmindGeo`] reads MaxMind GeoIP2 / GeoLite2 City and ASN databases and
//!   labels sources `CC/REGION` and `AS<n> <organisation>`, with `Unknown`
//!   standing in for anything the database lacks.
//! * [`PrefixGeoTable`] is a longest-prefix-match table read from a text file,
//!   one network per line:
//!
//! ```text
//! # cidr            location  asn    organisation
//! 192.0.2.0/24      US/CA     64500  Example Networks
//! 198.51.100.0/22   NL/NH     64501
//! 203.0.113.0/24    -         64502  Documentation Net
//! ```
//!
//! `-` leaves a column empty. A bare address is a /32.

use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use log::{debug, trace};
use maxminddb::{geoip2, Reader};

use crate::error::{Error, Result};
use crate::stats::LocalNet;

/// Labels recorded for one source address. A `None` leaves that table alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLabels {
    /// `CC/REGION`
    pub location: Option<String>,
    /// `AS<n> <organisation>`
    pub asn: Option<String>,
}

/// Maps an address to its location and network operator.
pub trait GeoResolver {
    fn resolve(&self, addr: Ipv4Addr) -> GeoLabels;
}

/// Placeholder for a field the database does not have.
pub const UNKNOWN: &str = "Unknown";

/// `CC/REGION` from ISO country and subdivision codes.
pub fn location_label(country: Option<&str>, region: Option<&str>) -> String {
    format!("{}/{}", country.unwrap_or(UNKNOWN), region.unwrap_or(UNKNOWN))
}

/// `AS<n> <organisation>`; a missing number is AS0.
pub fn asn_label(number: Option<u32>, organisation: Option<&str>) -> String {
    format!("AS{} {}", number.unwrap_or(0), organisation.unwrap_or(UNKNOWN))
}

/// Resolver backed by MaxMind databases. Either database may be absent, in
/// which case its dimension is left alone; with a database open, every address
/// gets a label, `Unknown` ones included.
pub struct MaxmindGeo {
    city: Option<Reader<Vec<u8>>>,
    asn: Option<Reader<Vec<u8>>>,
}

impl MaxmindGeo {
    pub fn open(city_db: Option<&Path>, asn_db: Option<&Path>) -> Result<Self> {
        let geo = Self {
            city: city_db.map(open_database).transpose()?,
            asn: asn_db.map(open_database).transpose()?,
        };
        debug!(
            "maxmind databases: city={} asn={}",
            geo.city.is_some(),
            geo.asn.is_some()
        );
        Ok(geo)
    }

    fn location(reader: &Reader<Vec<u8>>, addr: IpAddr) -> String {
        match reader.lookup::<geoip2::City>(addr) {
            Ok(city) => {
                let country = city.country.as_ref().and_then(|c| c.iso_code);
                let region = city
                    .subdivisions
                    .as_ref()
                    .and_then(|subs| subs.first())
                    .and_then(|sub| sub.iso_code);
                location_label(country, region)
            }
            Err(e) => {
                trace!("no city record for {}: {}", addr, e);
                location_label(None, None)
            }
        }
    }

    fn operator(reader: &Reader<Vec<u8>>, addr: IpAddr) -> String {
        match reader.lookup::<geoip2::Asn>(addr) {
            Ok(asn) => asn_label(asn.autonomous_system_number, asn.autonomous_system_organization),
            Err(e) => {
                trace!("no ASN record for {}: {}", addr, e);
                asn_label(None, None)
            }
        }
    }
}

impl GeoResolver for MaxmindGeo {
    fn resolve(&self, addr: Ipv4Addr) -> GeoLabels {
        let addr = IpAddr::V4(addr);
        GeoLabels {
            location: self.city.as_ref().map(|r| Self::location(r, addr)),
            asn: self.asn.as_ref().map(|r| Self::operator(r, addr)),
        }
    }
}

fn open_database(path: &Path) -> Result<Reader<Vec<u8>>> {
    Reader::open_readfile(path).map_err(|source| Error::GeoDatabase {
        path: path.to_path_buf(),
        source,
    })
}

/// Longest-prefix-match table of [`GeoLabels`].
#[derive(Debug)]
pub struct PrefixGeoTable {
    // one map per prefix length, keyed by the masked network address
    by_len: Vec<HashMap<u32, GeoLabels>>,
    entries: usize,
}

impl PrefixGeoTable {
    pub fn new() -> Self {
        Self {
            by_len: vec![HashMap::new(); 33],
            entries: 0,
        }
    }

    /// Reads a table file; see the module docs for the format.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let table = Self::parse(&text, path)?;
        debug!("loaded {} geo prefixes from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parses table text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut table = Self::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let invalid = |reason: String| Error::InvalidGeoTable {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason,
            };

            let mut fields = line.split_whitespace();
            let (net, location, asn) = match (fields.next(), fields.next(), fields.next()) {
                (Some(net), Some(location), Some(asn)) => (net, location, asn),
                _ => return Err(invalid("expected: CIDR LOCATION ASN [ORGANISATION]".to_string())),
            };
            let org = fields.collect::<Vec<_>>().join(" ");

            let net: LocalNet = net.parse().map_err(|e: Error| invalid(e.to_string()))?;

            let location = (location != "-").then(|| location.to_string());
            let asn = match asn {
                "-" => None,
                number => {
                    let number = number
                        .trim_start_matches("AS")
                        .parse::<u32>()
                        .map_err(|_| invalid(format!("'{}' is not an AS number", number)))?;
                    Some(if org.is_empty() {
                        format!("AS{}", number)
                    } else {
                        format!("AS{} {}", number, org)
                    })
                }
            };

            table.insert(net, GeoLabels { location, asn });
        }

        Ok(table)
    }

    /// Adds (or replaces) the labels for `net`.
    pub fn insert(&mut self, net: LocalNet, labels: GeoLabels) {
        let bits = net.prefix_bits();
        let key = masked(net.addr(), bits);
        if self.by_len[usize::from(bits)].insert(key, labels).is_none() {
            self.entries += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Labels of the most specific network containing `addr`.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&GeoLabels> {
        (0..self.by_len.len())
            .rev()
            .find_map(|bits| self.by_len[bits].get(&masked(addr, bits as u8)))
    }
}

impl Default for PrefixGeoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoResolver for PrefixGeoTable {
    fn resolve(&self, addr: Ipv4Addr) -> GeoLabels {
        self.lookup(addr).cloned().unwrap_or_default()
    }
}

fn masked(addr: Ipv4Addr, bits: u8) -> u32 {
    if bits == 0 {
        return 0;
    }
    u32::from(addr) & (u32::MAX << (32 - u32::from(bits.min(32))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# test table
10.0.0.0/8        US/CA   64500  Example Networks
10.1.0.0/16       US/NY   64501
10.1.2.3          -       AS64502 Single Host   # trailing comment
192.0.2.0/24      JP/13   -
";

    fn sample() -> PrefixGeoTable {
        PrefixGeoTable::parse(SAMPLE, Path::new("sample")).unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = sample();
        assert_eq!(table.len(), 4);

        let wide = table.resolve(Ipv4Addr::new(10, 200, 0, 1));
        assert_eq!(wide.location.as_deref(), Some("US/CA"));
        assert_eq!(wide.asn.as_deref(), Some("AS64500 Example Networks"));

        let narrow = table.resolve(Ipv4Addr::new(10, 1, 9, 9));
        assert_eq!(narrow.location.as_deref(), Some("US/NY"));
        assert_eq!(narrow.asn.as_deref(), Some("AS64501"));

        let host = table.resolve(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(host.location, None);
        assert_eq!(host.asn.as_deref(), Some("AS64502 Single Host"));
    }

    #[test]
    fn test_miss_and_partial_labels() {
        let table = sample();
        assert_eq!(table.resolve(Ipv4Addr::new(8, 8, 8, 8)), GeoLabels::default());
        let jp = table.resolve(Ipv4Addr::new(192, 0, 2, 77));
        assert_eq!(jp.location.as_deref(), Some("JP/13"));
        assert_eq!(jp.asn, None);
    }

    #[test]
    fn test_default_route_catches_everything() {
        let table = PrefixGeoTable::parse("0.0.0.0/0 ZZ/-- 1 Anywhere", Path::new("t")).unwrap();
        assert_eq!(
            table.resolve(Ipv4Addr::new(203, 0, 113, 9)).asn.as_deref(),
            Some("AS1 Anywhere")
        );
    }

    #[test]
    fn test_errors_name_the_line() {
        let err = PrefixGeoTable::parse("10.0.0.0/8 US/CA 1\n10.0.0.0/40 US 2\n", Path::new("geo.txt"))
            .unwrap_err();
        match err {
            Error::InvalidGeoTable { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(PrefixGeoTable::parse("10.0.0.0/8 US/CA\n", Path::new("t")).is_err());
        assert!(PrefixGeoTable::parse("10.0.0.0/8 US/CA ASX\n", Path::new("t")).is_err());
    }

    #[test]
    fn test_maxmind_label_formats() {
        assert_eq!(location_label(Some("US"), Some("CA")), "US/CA");
        assert_eq!(location_label(Some("NL"), None), "NL/Unknown");
        assert_eq!(location_label(None, None), "Unknown/Unknown");
        assert_eq!(asn_label(Some(64500), Some("Example Networks")), "AS64500 Example Networks");
        assert_eq!(asn_label(Some(64501), None), "AS64501 Unknown");
        assert_eq!(asn_label(None, None), "AS0 Unknown");
    }

    #[test]
    fn test_maxmind_without_databases_labels_nothing() {
        let geo = MaxmindGeo::open(None, None).unwrap();
        assert_eq!(geo.resolve(Ipv4Addr::new(192, 0, 2, 1)), GeoLabels::default());
    }

    #[test]
    fn test_maxmind_open_errors() {
        let missing = MaxmindGeo::open(Some(Path::new("/nonexistent/city.mmdb")), None);
        assert!(matches!(missing, Err(Error::GeoDatabase { .. })));

        let mut junk = tempfile::NamedTempFile::new().unwrap();
        junk.write_all(b"not a maxmind database").unwrap();
        let err = MaxmindGeo::open(None, Some(junk.path())).err().unwrap();
        match err {
            Error::GeoDatabase { path, .. } => assert_eq!(path, junk.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = PrefixGeoTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 4);

        let missing = PrefixGeoTable::load(Path::new("/nonexistent/geo.txt"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
