use std::path::PathBuf;

use clap::Parser;

/// dnsvisor - live DNS top talkers
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dnsvisor",
    version,
    about = "Live DNS traffic analytics: top sources, names, rcodes and more"
)]
pub struct CliArgs {
    /// Capture from this interface (default: pcap's default device)
    #[arg(short, long, value_name = "NAME", conflicts_with = "read")]
    pub interface: Option<String>,

    /// Replay a pcap savefile instead of capturing live
    #[arg(short, long, value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// BPF capture filter
    #[arg(short, long, value_name = "BPF", default_value = "udp port 53")]
    pub filter: String,

    /// Local network; traffic *to* it is incoming (0.0.0.0/0 treats everything as incoming)
    #[arg(short, long, value_name = "CIDR", default_value = "0.0.0.0/0")]
    pub local_net: String,

    /// Maximum number of keys kept per table
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    pub table_size: usize,

    /// Per-table capacity, e.g. `query3=50000` (repeatable)
    #[arg(long, value_name = "TABLE=N")]
    pub table_size_for: Vec<String>,

    /// Rows per table in the final summary
    #[arg(short = 'n', long, value_name = "N", default_value_t = 10)]
    pub top: usize,

    /// Display refresh interval in seconds (0 refreshes on every pass)
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    pub redraw: u64,

    /// Capture queue depth; packets arriving while it is full are dropped
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    pub queue: usize,

    /// MaxMind GeoIP2/GeoLite2 City database for location labels
    #[arg(long, value_name = "FILE")]
    pub city_db: Option<PathBuf>,

    /// MaxMind GeoIP2/GeoLite2 ASN database for operator labels
    #[arg(long, value_name = "FILE")]
    pub asn_db: Option<PathBuf>,

    /// Text prefix table for geo/ASN labels, instead of MaxMind databases
    #[arg(long, value_name = "FILE", conflicts_with_all = ["city_db", "asn_db"])]
    pub geo_table: Option<PathBuf>,

    /// Run without the interactive display and print the summary at exit
    #[arg(long)]
    pub no_ui: bool,

    /// Write log output here while the display is up
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["dnsvisor"]);
        assert_eq!(args.filter, "udp port 53");
        assert_eq!(args.local_net, "0.0.0.0/0");
        assert_eq!(args.table_size, 10_000);
        assert_eq!(args.top, 10);
        assert_eq!(args.redraw, 1);
        assert!(!args.no_ui);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_flags() {
        let args = CliArgs::parse_from([
            "dnsvisor",
            "-r",
            "dump.pcap",
            "-l",
            "10.0.0.0/8",
            "--table-size-for",
            "query3=500",
            "--table-size-for",
            "sources=20",
            "-vv",
            "--no-ui",
        ]);
        assert_eq!(args.read, Some(PathBuf::from("dump.pcap")));
        assert_eq!(args.local_net, "10.0.0.0/8");
        assert_eq!(args.table_size_for, vec!["query3=500", "sources=20"]);
        assert_eq!(args.verbose, 2);
        assert!(args.no_ui);
    }

    #[test]
    fn test_geo_sources() {
        let args = CliArgs::parse_from([
            "dnsvisor",
            "--city-db",
            "GeoLite2-City.mmdb",
            "--asn-db",
            "GeoLite2-ASN.mmdb",
        ]);
        assert_eq!(args.city_db, Some(PathBuf::from("GeoLite2-City.mmdb")));
        assert_eq!(args.asn_db, Some(PathBuf::from("GeoLite2-ASN.mmdb")));

        assert!(
            CliArgs::try_parse_from(["dnsvisor", "--city-db", "c.mmdb", "--geo-table", "t.txt"])
                .is_err()
        );
    }

    #[test]
    fn test_interface_and_file_conflict() {
        assert!(CliArgs::try_parse_from(["dnsvisor", "-i", "eth0", "-r", "x.pcap"]).is_err());
    }
}
