use crate::error::DecodeError;

/// GRE payload protocol for bridged Ethernet frames.
pub const GRE_PROTO_TEB: u16 = 0x6558;

const GRE_BASE_LEN: usize = 4;
const FLAG_CHECKSUM: u16 = 0x8000;
const FLAG_KEY: u16 = 0x2000;
const FLAG_SEQUENCE: u16 = 0x1000;
const VERSION_MASK: u16 = 0x0007;

#[derive(Debug)]
pub struct GrePacket<'a> {
    /// EtherType of the encapsulated packet
    pub protocol: u16,
    pub payload: &'a [u8],
}

/// Parses a version 0 GRE header (RFC 2784/2890), skipping the optional
/// checksum, key and sequence words.
pub fn parse_gre(data: &[u8]) -> Result<GrePacket<'_>, DecodeError> {
    if data.len() < GRE_BASE_LEN {
        return Err(DecodeError::TooShort {
            layer: "GRE",
            needed: GRE_BASE_LEN,
            have: data.len(),
        });
    }

    let flags = u16::from_be_bytes([data[0], data[1]]);
    if flags & VERSION_MASK != 0 {
        return Err(DecodeError::InvalidField {
            layer: "GRE",
            field: "version",
        });
    }

    let header_len = GRE_BASE_LEN
        + [FLAG_CHECKSUM, FLAG_KEY, FLAG_SEQUENCE]
            .iter()
            .filter(|&&flag| flags & flag != 0)
            .count()
            * 4;

    if data.len() < header_len {
        return Err(DecodeError::TooShort {
            layer: "GRE",
            needed: header_len,
            have: data.len(),
        });
    }

    Ok(GrePacket {
        protocol: u16::from_be_bytes([data[2], data[3]]),
        payload: &data[header_len..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_header() {
        let data = [0x00, 0x00, 0x08, 0x00, 0x45];
        let gre = parse_gre(&data).unwrap();
        assert_eq!(gre.protocol, 0x0800);
        assert_eq!(gre.payload, &[0x45]);
    }

    #[test]
    fn test_key_and_sequence_skipped() {
        let mut data = vec![0x30, 0x00, 0x65, 0x58];
        data.extend_from_slice(&[0; 8]);
        data.push(0xFF);
        let gre = parse_gre(&data).unwrap();
        assert_eq!(gre.protocol, GRE_PROTO_TEB);
        assert_eq!(gre.payload, &[0xFF]);
    }

    #[test]
    fn test_rejects_enhanced_gre_and_short() {
        assert!(parse_gre(&[0x00, 0x01, 0x88, 0x0B]).is_err());
        assert!(parse_gre(&[0x80, 0x00, 0x08, 0x00]).is_err());
        assert!(parse_gre(&[0x00]).is_err());
    }
}
