//! Validated runtime configuration, built from the command line before any
//! packet is read.

use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;

use crate::cli::CliArgs;
use crate::error::{Error, Result};
use crate::stats::{ContextConfig, Dimension, LocalNet};

/// Where packets come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Live capture; `None` picks pcap's default device
    Device(Option<String>),
    /// Replay of a savefile
    File(PathBuf),
}

impl CaptureSource {
    pub fn is_file(&self) -> bool {
        matches!(self, CaptureSource::File(_))
    }
}

/// Where geo/ASN labels come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeoSource {
    #[default]
    Disabled,
    /// MaxMind City and/or ASN databases
    Maxmind {
        city_db: Option<PathBuf>,
        asn_db: Option<PathBuf>,
    },
    /// Text prefix table
    PrefixTable(PathBuf),
}

impl GeoSource {
    fn from_args(args: &CliArgs) -> Self {
        match (&args.city_db, &args.asn_db, &args.geo_table) {
            (_, _, Some(table)) => GeoSource::PrefixTable(table.clone()),
            (None, None, None) => GeoSource::Disabled,
            (city_db, asn_db, None) => GeoSource::Maxmind {
                city_db: city_db.clone(),
                asn_db: asn_db.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: CaptureSource,
    pub filter: String,
    pub context: ContextConfig,
    pub top: usize,
    /// `Duration::ZERO` redraws on every pass of the ingestion loop.
    pub redraw: Duration,
    pub queue_depth: usize,
    pub geo: GeoSource,
    pub ui: bool,
    pub log_file: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl RunConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let local_net: LocalNet = args.local_net.parse()?;

        let table_size = check_capacity(args.table_size, &args.table_size.to_string())?;
        let table_size_overrides = args
            .table_size_for
            .iter()
            .map(|spec| parse_override(spec))
            .collect::<Result<Vec<_>>>()?;

        let source = match &args.read {
            Some(path) => CaptureSource::File(path.clone()),
            None => CaptureSource::Device(args.interface.clone()),
        };

        Ok(Self {
            source,
            filter: args.filter.clone(),
            context: ContextConfig {
                local_net,
                table_size,
                table_size_overrides,
            },
            top: args.top,
            redraw: Duration::from_secs(args.redraw),
            queue_depth: args.queue.max(1),
            geo: GeoSource::from_args(args),
            ui: !args.no_ui,
            log_file: args.log_file.clone(),
            log_level: level_for(args.verbose),
        })
    }
}

/// `-v` count to a default log level.
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parses one `--table-size-for TABLE=N`.
fn parse_override(spec: &str) -> Result<(Dimension, usize)> {
    let invalid = |reason: String| Error::InvalidCapacity {
        spec: spec.to_string(),
        reason,
    };

    let (name, size) = spec
        .split_once('=')
        .ok_or_else(|| invalid("expected TABLE=N".to_string()))?;
    let dimension = name.parse::<Dimension>().map_err(invalid)?;
    let size = size
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid(format!("'{}' is not a number", size.trim())))?;

    Ok((dimension, check_capacity(size, spec)?))
}

fn check_capacity(size: usize, spec: &str) -> Result<usize> {
    if size == 0 {
        return Err(Error::InvalidCapacity {
            spec: spec.to_string(),
            reason: "a table must hold at least one key".to_string(),
        });
    }
    Ok(size)
}
