use crate::error::DecodeError;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88A8;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const MAX_VLAN_TAGS: usize = 2;

/// Ethernet II frame with any 802.1Q / 802.1ad tags already peeled off.
#[derive(Debug)]
pub struct EthernetFrame<'a> {
    pub src_mac: [u8; 6],
    pub dst_mac: [u8; 6],
    pub ethertype: u16,
    pub payload: &'a [u8],
}

/// Parses an Ethernet II header, stepping over up to two VLAN tags.
pub fn parse_ethernet(data: &[u8]) -> Result<EthernetFrame<'_>, DecodeError> {
    if data.len() < ETHERNET_HEADER_LEN {
        return Err(DecodeError::TooShort {
            layer: "Ethernet",
            needed: ETHERNET_HEADER_LEN,
            have: data.len(),
        });
    }

    let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
    let mut offset = ETHERNET_HEADER_LEN;
    let mut tags = 0;

    while matches!(ethertype, ETHERTYPE_VLAN | ETHERTYPE_QINQ) && tags < MAX_VLAN_TAGS {
        if data.len() < offset + VLAN_TAG_LEN {
            return Err(DecodeError::TooShort {
                layer: "802.1Q",
                needed: offset + VLAN_TAG_LEN,
                have: data.len(),
            });
        }
        // TCI (2 bytes) then the inner EtherType
        ethertype = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
        offset += VLAN_TAG_LEN;
        tags += 1;
    }

    Ok(EthernetFrame {
        src_mac: mac_from_slice(&data[6..12]),
        dst_mac: mac_from_slice(&data[0..6]),
        ethertype,
        payload: &data[offset..],
    })
}

fn mac_from_slice(slice: &[u8]) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(slice);
    mac
}
