use log::info;
use pcap::{Activated, Capture, Device};

use crate::config::CaptureSource;
use crate::error::{Error, Result};
use crate::packet::LinkType;

/// Read timeout for live captures, so the capture thread notices shutdown.
const READ_TIMEOUT_MS: i32 = 100;
const SNAPLEN: i32 = 65_535;

/// An opened, filtered capture plus the link type its frames use.
pub struct CaptureHandle {
    pub capture: Capture<dyn Activated>,
    pub link: LinkType,
    pub description: String,
}

/// Opens the configured source and applies the BPF filter.
pub fn open_capture(source: &CaptureSource, filter: &str) -> Result<CaptureHandle> {
    let (mut capture, description): (Capture<dyn Activated>, String) = match source {
        CaptureSource::Device(name) => {
            let device = match name {
                Some(name) => Device::from(name.as_str()),
                None => Device::lookup()?.ok_or(Error::Capture(pcap::Error::PcapError(
                    "no default capture device".to_string(),
                )))?,
            };
            let description = format!("interface {}", device.name);
            (open_device_capture(device)?.into(), description)
        }
        CaptureSource::File(path) => (
            Capture::from_file(path)?.into(),
            format!("file {}", path.display()),
        ),
    };

    if !filter.trim().is_empty() {
        capture.filter(filter, true)?;
    }

    let dlt = capture.get_datalink().0;
    let link = LinkType::from_dlt(dlt).map_err(|e| {
        Error::Capture(pcap::Error::PcapError(format!("{}: {}", description, e)))
    })?;
    info!("capturing from {} ({:?}), filter '{}'", description, link, filter);

    Ok(CaptureHandle {
        capture,
        link,
        description,
    })
}

pub fn open_device_capture(device: Device) -> Result<Capture<pcap::Active>> {
    let capture = Capture::from_device(device)?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()?;
    Ok(capture)
}
