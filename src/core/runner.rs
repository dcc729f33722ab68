use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver};
use log::{debug, info, warn};

use crate::capture::open_capture;
use crate::config::{GeoSource, RunConfig};
use crate::core::capture_loop::{spawn_capture_thread, IngestStats};
use crate::error::Result;
use crate::geo::{MaxmindGeo, PrefixGeoTable};
use crate::packet::DnsEvent;
use crate::stats::{DnsTrafficContext, TrafficSnapshot};
use crate::ui::tui::{spawn_input_handler, RateTracker, Tui, UiCommand, UiState, View, SUMMARY_ROWS};

/// How often the loop re-checks the running flag when nothing arrives.
const IDLE_WAKEUP: Duration = Duration::from_millis(100);

/// What a finished run leaves behind for the final summary.
pub struct RunOutcome {
    pub context: DnsTrafficContext,
    pub ingest: Arc<IngestStats>,
}

/// Builds the aggregator described by `config`, opening the geo source if
/// one is configured.
pub fn build_context(config: &RunConfig) -> Result<DnsTrafficContext> {
    let ctx = DnsTrafficContext::new(&config.context);
    match &config.geo {
        GeoSource::Disabled => Ok(ctx),
        GeoSource::Maxmind { city_db, asn_db } => {
            let geo = MaxmindGeo::open(city_db.as_deref(), asn_db.as_deref())?;
            info!("geo labels from MaxMind databases");
            Ok(ctx.with_geo_resolver(Box::new(geo)))
        }
        GeoSource::PrefixTable(path) => {
            let table = PrefixGeoTable::load(path)?;
            info!("geo table {}: {} prefixes", path.display(), table.len());
            Ok(ctx.with_geo_resolver(Box::new(table)))
        }
    }
}

/// Runs a capture session to completion: opens the source, starts the capture
/// thread (and the display, if enabled) and aggregates until shutdown.
pub fn run(config: &RunConfig, running: Arc<AtomicBool>) -> Result<RunOutcome> {
    let mut context = build_context(config)?;
    let handle = open_capture(&config.source, &config.filter)?;

    let mut tui = if config.ui { Some(Tui::new()?) } else { None };

    let ingest = Arc::new(IngestStats::default());
    let (tx, rx) = bounded::<DnsEvent>(config.queue_depth);
    let capture_thread = spawn_capture_thread(handle, tx, Arc::clone(&running), Arc::clone(&ingest));

    let (key_tx, key_rx) = unbounded();
    let input_thread = tui
        .as_ref()
        .map(|_| spawn_input_handler(Arc::clone(&running), key_tx));

    let keys = if tui.is_some() { key_rx } else { never() };
    let result = ingest_loop(
        &mut context,
        rx,
        keys,
        tui.as_mut(),
        &running,
        &ingest,
        config.redraw,
    );

    running.store(false, Ordering::SeqCst);
    // restore the terminal before anything else gets printed
    drop(tui);

    if capture_thread.join().is_err() {
        warn!("capture thread panicked");
    }
    if let Some(handle) = input_thread {
        if handle.join().is_err() {
            warn!("input thread panicked");
        }
    }

    result?;
    Ok(RunOutcome { context, ingest })
}

enum Step {
    Event(DnsEvent),
    SourceDone,
    Tick,
    Command(UiCommand),
    KeysGone,
    Idle,
}

/// The single ingestion path. Events are applied in arrival order; the
/// display is redrawn from a snapshot when a redraw is due.
///
/// Returns when `running` is cleared, the user quits, or (without a display)
/// the event source is exhausted.
pub fn ingest_loop(
    ctx: &mut DnsTrafficContext,
    mut events: Receiver<DnsEvent>,
    mut keys: Receiver<UiCommand>,
    mut tui: Option<&mut Tui>,
    running: &AtomicBool,
    ingest: &IngestStats,
    redraw: Duration,
) -> Result<()> {
    let ticker = if redraw.is_zero() || tui.is_none() {
        never()
    } else {
        tick(redraw)
    };

    let mut state = UiState::new();
    let mut rates = RateTracker::new();
    let mut redraw_requested = tui.is_some();

    while running.load(Ordering::SeqCst) {
        let step = select! {
            recv(events) -> msg => match msg {
                Ok(event) => Step::Event(event),
                Err(_) => Step::SourceDone,
            },
            recv(ticker) -> _ => Step::Tick,
            recv(keys) -> msg => match msg {
                Ok(command) => Step::Command(command),
                Err(_) => Step::KeysGone,
            },
            default(IDLE_WAKEUP) => Step::Idle,
        };

        match step {
            Step::Event(event) => {
                ctx.update(&event);
                if redraw.is_zero() {
                    redraw_requested = true;
                }
            }
            Step::SourceDone => {
                info!("event source finished after {} DNS packets", ctx.counters().seen);
                if tui.is_none() {
                    break;
                }
                events = never();
                state.source_done = true;
                redraw_requested = true;
            }
            Step::Tick | Step::Command(UiCommand::Resize) => redraw_requested = true,
            Step::Command(UiCommand::Quit) => break,
            Step::Command(UiCommand::Key(c)) => {
                if state.source_done && c.eq_ignore_ascii_case(&'q') {
                    break;
                }
                if let Some(view) = View::from_key(c) {
                    debug!("view {:?}", view);
                    state.view = view;
                    redraw_requested = true;
                }
            }
            Step::KeysGone => keys = never(),
            Step::Idle => redraw_requested |= redraw.is_zero(),
        }

        if redraw_requested {
            if let Some(tui) = tui.as_deref_mut() {
                let rows = match state.view {
                    View::Table(_) => tui.table_rows(),
                    _ => SUMMARY_ROWS,
                };
                let snapshot = TrafficSnapshot::capture(ctx, rows, ingest.dropped());
                state.rates = rates.sample(Instant::now(), snapshot.counters);
                tui.draw(&snapshot, &state)?;
            }
            redraw_requested = false;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::DnsHeader;
    use crate::stats::ContextConfig;
    use std::net::Ipv4Addr;

    fn query(n: u8) -> DnsEvent {
        DnsEvent {
            src_addr: Ipv4Addr::new(192, 0, 2, n),
            dest_addr: Ipv4Addr::new(10, 0, 0, 1),
            src_port: 40000,
            dest_port: 53,
            direction_hint: None,
            payload_len: 30,
            header: Some(DnsHeader::default()),
            question: None,
            has_edns: false,
        }
    }

    #[test]
    fn test_headless_loop_drains_then_returns() {
        let (tx, rx) = bounded(16);
        for n in 0..5 {
            tx.send(query(n)).unwrap();
        }
        drop(tx);

        let mut ctx = DnsTrafficContext::new(&ContextConfig::default());
        let running = AtomicBool::new(true);
        let ingest = IngestStats::default();
        ingest_loop(&mut ctx, rx, never(), None, &running, &ingest, Duration::from_secs(1)).unwrap();

        assert_eq!(ctx.counters().seen, 5);
        assert_eq!(ctx.counters().query, 5);
    }

    #[test]
    fn test_cleared_flag_stops_loop() {
        let (_tx, rx) = bounded::<DnsEvent>(1);
        let mut ctx = DnsTrafficContext::new(&ContextConfig::default());
        let running = AtomicBool::new(false);
        let ingest = IngestStats::default();
        ingest_loop(&mut ctx, rx, never(), None, &running, &ingest, Duration::ZERO).unwrap();
        assert_eq!(ctx.counters().seen, 0);
    }
}
