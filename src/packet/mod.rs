//! Event Source side: turns captured link-layer frames into [`DnsEvent`]s.
//!
//! Decoding walks link layer -> IPv4 (optionally through one GRE tunnel) -> UDP
//! and hands the UDP payload to the DNS wire decoder when either port is 53.
//! Frames that are simply not DNS come back as `Ok(None)`.

mod dns;
mod ethernet;
mod gre;
mod ipv4;
mod sll;
mod udp;

pub use dns::{
    decode_message, qtype_name, rcode, rcode_name, DnsHeader, DnsMessage, DnsQuestion,
    DNS_HEADER_LEN, TYPE_OPT,
};
pub use ethernet::{parse_ethernet, EthernetFrame, ETHERTYPE_IPV4};
pub use gre::{parse_gre, GrePacket, GRE_PROTO_TEB};
pub use ipv4::{parse_ipv4, Ipv4Packet, PROTO_GRE, PROTO_UDP};
pub use sll::{parse_sll, parse_sll2, CookedFrame};
pub use udp::{parse_udp, UdpDatagram};

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::DecodeError;

/// Well-known DNS port.
pub const DNS_PORT: u16 = 53;

/// Tunnels deeper than this are not unwrapped.
const MAX_ENCAPSULATION: usize = 2;

/// Direction reported by the capture layer, when it knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
    Other,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => write!(f, "<"),
            Direction::Outgoing => write!(f, ">"),
            Direction::Other => write!(f, "?"),
        }
    }
}

/// Link-layer framing of captured packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    LinuxSll,
    LinuxSll2,
    RawIpv4,
    /// BSD loopback: 4-byte address family in host byte order
    Null,
}

impl LinkType {
    /// Maps a pcap DLT value onto a supported framing.
    pub fn from_dlt(dlt: i32) -> Result<Self, DecodeError> {
        match dlt {
            0 | 108 => Ok(LinkType::Null),
            1 => Ok(LinkType::Ethernet),
            // DLT_RAW differs between platforms; LINKTYPE_IPV4 is 228
            12 | 14 | 101 | 228 => Ok(LinkType::RawIpv4),
            113 => Ok(LinkType::LinuxSll),
            276 => Ok(LinkType::LinuxSll2),
            other => Err(DecodeError::UnsupportedLinkType(other)),
        }
    }
}

/// One decoded DNS packet, ready for the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsEvent {
    pub src_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub src_port: u16,
    pub dest_port: u16,
    pub direction_hint: Option<Direction>,
    /// Length of the DNS payload (UDP data), in bytes.
    pub payload_len: usize,
    /// `None` when the payload is shorter than a DNS header.
    pub header: Option<DnsHeader>,
    /// `None` when there is no question or it could not be decoded.
    pub question: Option<DnsQuestion>,
    pub has_edns: bool,
}

impl DnsEvent {
    pub fn qname(&self) -> Option<&str> {
        self.question.as_ref().map(|q| q.name.as_str())
    }
}

impl fmt::Display for DnsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_addr, self.src_port, self.dest_addr, self.dest_port
        )?;
        if let Some(dir) = self.direction_hint {
            write!(f, " [{}]", dir)?;
        }
        match &self.header {
            Some(h) => write!(
                f,
                " {} {}",
                if h.qr { "reply" } else { "query" },
                rcode_name(h.rcode)
            )?,
            None => write!(f, " short ({} bytes)", self.payload_len)?,
        }
        if let Some(q) = &self.question {
            write!(f, " {} {}", q.name, qtype_name(q.qtype))?;
        }
        Ok(())
    }
}

/// Decodes one captured frame.
///
/// # Returns
/// * `Ok(Some(event))` for a UDP packet to or from port 53
/// * `Ok(None)` for anything that is not IPv4/UDP DNS
/// * `Err(DecodeError)` when a lower-layer header is broken
pub fn decode_frame(link: LinkType, frame: &[u8]) -> Result<Option<DnsEvent>, DecodeError> {
    match link {
        LinkType::Ethernet => decode_ethernet(frame, None, 0),
        LinkType::LinuxSll => {
            let cooked = parse_sll(frame)?;
            decode_ethertype(cooked.protocol, cooked.payload, Some(cooked.direction), 0)
        }
        LinkType::LinuxSll2 => {
            let cooked = parse_sll2(frame)?;
            decode_ethertype(cooked.protocol, cooked.payload, Some(cooked.direction), 0)
        }
        LinkType::RawIpv4 => match frame.first() {
            Some(b) if b >> 4 == 4 => decode_ipv4(frame, None, 0),
            _ => Ok(None),
        },
        LinkType::Null => {
            if frame.len() < 4 {
                return Err(DecodeError::TooShort {
                    layer: "Null",
                    needed: 4,
                    have: frame.len(),
                });
            }
            // AF_INET is 2 everywhere; the word is in the capturing host's order
            let family = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
            if family == 2 || family.swap_bytes() == 2 {
                decode_ipv4(&frame[4..], None, 0)
            } else {
                Ok(None)
            }
        }
    }
}

fn decode_ethernet(
    frame: &[u8],
    hint: Option<Direction>,
    depth: usize,
) -> Result<Option<DnsEvent>, DecodeError> {
    let eth = parse_ethernet(frame)?;
    decode_ethertype(eth.ethertype, eth.payload, hint, depth)
}

fn decode_ethertype(
    ethertype: u16,
    payload: &[u8],
    hint: Option<Direction>,
    depth: usize,
) -> Result<Option<DnsEvent>, DecodeError> {
    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(payload, hint, depth),
        _ => Ok(None),
    }
}

fn decode_ipv4(
    data: &[u8],
    hint: Option<Direction>,
    depth: usize,
) -> Result<Option<DnsEvent>, DecodeError> {
    let ip = parse_ipv4(data)?;
    if ip.is_later_fragment {
        return Ok(None);
    }

    match ip.protocol {
        PROTO_UDP => {
            let udp = parse_udp(ip.payload)?;
            if udp.src_port != DNS_PORT && udp.dst_port != DNS_PORT {
                return Ok(None);
            }
            let message = decode_message(udp.payload);
            Ok(Some(DnsEvent {
                src_addr: ip.src,
                dest_addr: ip.dst,
                src_port: udp.src_port,
                dest_port: udp.dst_port,
                direction_hint: hint,
                payload_len: udp.payload.len(),
                header: message.header,
                question: message.question,
                has_edns: message.has_edns,
            }))
        }
        PROTO_GRE if depth < MAX_ENCAPSULATION => {
            let gre = parse_gre(ip.payload)?;
            match gre.protocol {
                GRE_PROTO_TEB => decode_ethernet(gre.payload, hint, depth + 1),
                inner => decode_ethertype(inner, gre.payload, hint, depth + 1),
            }
        }
        _ => Ok(None),
    }
}
