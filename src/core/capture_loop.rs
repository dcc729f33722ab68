use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, trace, warn};

use crate::capture::CaptureHandle;
use crate::packet::{decode_frame, DnsEvent};

/// Counters kept by the capture thread, readable from anywhere.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// DNS events refused because the queue was full
    pub dropped: AtomicU64,
    /// Frames that were not IPv4/UDP DNS
    pub skipped: AtomicU64,
    /// Frames whose lower layers could not be decoded
    pub decode_errors: AtomicU64,
}

impl IngestStats {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

/// What happened to an event offered to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    Dropped,
    Closed,
}

/// Offers `event` to the queue without blocking. A full queue drops the new
/// event and counts it.
pub fn offer_event(tx: &Sender<DnsEvent>, event: DnsEvent, stats: &IngestStats) -> Offer {
    match tx.try_send(event) {
        Ok(()) => Offer::Queued,
        Err(TrySendError::Full(_)) => {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            Offer::Dropped
        }
        Err(TrySendError::Disconnected(_)) => Offer::Closed,
    }
}

/// Spawns the capture thread: read, decode, hand off. It ends when `running`
/// is cleared, the savefile runs out, or the receiving side goes away. The
/// sender is dropped on exit, which is how the ingestion loop learns the
/// source is finished.
pub fn spawn_capture_thread(
    handle: CaptureHandle,
    tx: Sender<DnsEvent>,
    running: Arc<AtomicBool>,
    stats: Arc<IngestStats>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let CaptureHandle {
            mut capture,
            link,
            description,
        } = handle;

        while running.load(Ordering::SeqCst) {
            match capture.next_packet() {
                Ok(packet) => match decode_frame(link, packet.data) {
                    Ok(Some(event)) => {
                        trace!("{}", event);
                        if offer_event(&tx, event, &stats) == Offer::Closed {
                            break;
                        }
                    }
                    Ok(None) => {
                        stats.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        trace!("undecodable frame: {}", e);
                        stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    }
                },
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => {
                    info!("end of {}", description);
                    break;
                }
                Err(e) => {
                    warn!("capture error on {}: {}", description, e);
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }

        debug!(
            "capture thread done: dropped={} skipped={} decode_errors={}",
            stats.dropped(),
            stats.skipped(),
            stats.decode_errors()
        );
    })
}
