// src/packet/udp.rs

use crate::error::DecodeError;

const UDP_HEADER_LEN: usize = 8;

#[derive(Debug)]
pub struct UdpDatagram<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

/// Parses a UDP header (minimum 8 bytes).
///
/// # Arguments
/// * `data` - A byte slice starting at the UDP header
///
/// # Returns
/// * `Ok(UdpDatagram)` with the payload bounded by the length field (or by the
///   captured bytes, if fewer)
/// * `Err(DecodeError)` if the header is short or the length field is below 8
pub fn parse_udp(data: &[u8]) -> Result<UdpDatagram<'_>, DecodeError> {
    if data.len() < UDP_HEADER_LEN {
        return Err(DecodeError::TooShort {
            layer: "UDP",
            needed: UDP_HEADER_LEN,
            have: data.len(),
        });
    }

    let src_port = u16::from_be_bytes([data[0], data[1]]);
    let dst_port = u16::from_be_bytes([data[2], data[3]]);
    let length = usize::from(u16::from_be_bytes([data[4], data[5]])); // header + data

    if length < UDP_HEADER_LEN {
        return Err(DecodeError::InvalidField {
            layer: "UDP",
            field: "length",
        });
    }

    Ok(UdpDatagram {
        src_port,
        dst_port,
        payload: &data[UDP_HEADER_LEN..length.min(data.len())],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_and_payload() {
        let data = [0x30, 0x39, 0x00, 0x35, 0x00, 0x0B, 0x00, 0x00, 1, 2, 3, 4];
        let udp = parse_udp(&data).unwrap();
        assert_eq!(udp.src_port, 12345);
        assert_eq!(udp.dst_port, 53);
        assert_eq!(udp.payload, &[1, 2, 3]);
    }

    #[test]
    fn test_length_below_header_rejected() {
        let data = [0, 53, 0, 53, 0, 4, 0, 0];
        assert!(parse_udp(&data).is_err());
        assert!(parse_udp(&data[..7]).is_err());
    }
}
