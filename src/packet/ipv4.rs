use std::net::Ipv4Addr;

use crate::error::DecodeError;

pub const PROTO_UDP: u8 = 17;
pub const PROTO_GRE: u8 = 47;

const MIN_HEADER_LEN: usize = 20;

#[derive(Debug)]
pub struct Ipv4Packet<'a> {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    /// Not the first fragment, so no transport header follows.
    pub is_later_fragment: bool,
    pub payload: &'a [u8],
}

/// Parses an IPv4 header and bounds the payload by the total-length field,
/// or by what was captured if the capture is shorter.
pub fn parse_ipv4(data: &[u8]) -> Result<Ipv4Packet<'_>, DecodeError> {
    if data.len() < MIN_HEADER_LEN {
        return Err(DecodeError::TooShort {
            layer: "IPv4",
            needed: MIN_HEADER_LEN,
            have: data.len(),
        });
    }

    if data[0] >> 4 != 4 {
        return Err(DecodeError::InvalidField {
            layer: "IPv4",
            field: "version",
        });
    }

    let header_len = usize::from(data[0] & 0x0F) * 4;
    if header_len < MIN_HEADER_LEN {
        return Err(DecodeError::InvalidField {
            layer: "IPv4",
            field: "header length",
        });
    }
    if data.len() < header_len {
        return Err(DecodeError::TooShort {
            layer: "IPv4",
            needed: header_len,
            have: data.len(),
        });
    }

    let total_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
    if total_len < header_len {
        return Err(DecodeError::InvalidField {
            layer: "IPv4",
            field: "total length",
        });
    }
    let end = total_len.min(data.len());

    let fragment_offset = u16::from_be_bytes([data[6], data[7]]) & 0x1FFF;

    Ok(Ipv4Packet {
        src: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
        dst: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        protocol: data[9],
        is_later_fragment: fragment_offset != 0,
        payload: &data[header_len..end],
    })
}
