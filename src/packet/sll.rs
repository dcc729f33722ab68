// Linux "cooked" capture headers, what libpcap hands back for the `any` device.

use super::Direction;
use crate::error::DecodeError;

const SLL_HEADER_LEN: usize = 16;
const SLL2_HEADER_LEN: usize = 20;

// sll_pkttype values
const PACKET_HOST: u16 = 0;
const PACKET_OUTGOING: u16 = 4;

#[derive(Debug)]
pub struct CookedFrame<'a> {
    pub protocol: u16,
    pub direction: Direction,
    pub payload: &'a [u8],
}

/// LINUX_SLL (v1): pkttype(2) hatype(2) halen(2) addr(8) protocol(2)
pub fn parse_sll(data: &[u8]) -> Result<CookedFrame<'_>, DecodeError> {
    if data.len() < SLL_HEADER_LEN {
        return Err(DecodeError::TooShort {
            layer: "SLL",
            needed: SLL_HEADER_LEN,
            have: data.len(),
        });
    }
    let pkttype = u16::from_be_bytes([data[0], data[1]]);
    Ok(CookedFrame {
        protocol: u16::from_be_bytes([data[14], data[15]]),
        direction: direction_of(pkttype),
        payload: &data[SLL_HEADER_LEN..],
    })
}

/// LINUX_SLL2: protocol(2) reserved(2) ifindex(4) hatype(2) pkttype(1) halen(1) addr(8)
pub fn parse_sll2(data: &[u8]) -> Result<CookedFrame<'_>, DecodeError> {
    if data.len() < SLL2_HEADER_LEN {
        return Err(DecodeError::TooShort {
            layer: "SLL2",
            needed: SLL2_HEADER_LEN,
            have: data.len(),
        });
    }
    Ok(CookedFrame {
        protocol: u16::from_be_bytes([data[0], data[1]]),
        direction: direction_of(u16::from(data[10])),
        payload: &data[SLL2_HEADER_LEN..],
    })
}

fn direction_of(pkttype: u16) -> Direction {
    match pkttype {
        PACKET_HOST => Direction::Incoming,
        PACKET_OUTGOING => Direction::Outgoing,
        _ => Direction::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sll_v1() {
        let mut data = vec![0, 4, 0, 1, 0, 6, 1, 2, 3, 4, 5, 6, 0, 0, 0x08, 0x00];
        data.push(0x45);
        let f = parse_sll(&data).unwrap();
        assert_eq!(f.protocol, 0x0800);
        assert_eq!(f.direction, Direction::Outgoing);
        assert_eq!(f.payload, &[0x45]);
    }

    #[test]
    fn test_sll_v2() {
        let mut data = vec![0x08, 0x00, 0, 0, 0, 0, 0, 2, 0, 1, 0, 6];
        data.extend_from_slice(&[0; 8]);
        let f = parse_sll2(&data).unwrap();
        assert_eq!(f.protocol, 0x0800);
        assert_eq!(f.direction, Direction::Incoming);
        assert!(f.payload.is_empty());
    }

    #[test]
    fn test_short_headers() {
        assert!(parse_sll(&[0; 15]).is_err());
        assert!(parse_sll2(&[0; 19]).is_err());
    }
}
