use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// The configured local network, used to tell incoming from outgoing traffic.
///
/// A prefix length of zero matches every address, which is what "no local
/// network configured" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNet {
    addr: Ipv4Addr,
    prefix_bits: u8,
}

impl LocalNet {
    /// Matches everything: all traffic is treated as incoming.
    pub const ANY: LocalNet = LocalNet {
        addr: Ipv4Addr::UNSPECIFIED,
        prefix_bits: 0,
    };

    pub fn new(addr: Ipv4Addr, prefix_bits: u8) -> Result<Self, Error> {
        if prefix_bits > 32 {
            return Err(Error::InvalidLocalNet {
                spec: format!("{}/{}", addr, prefix_bits),
                reason: "prefix length must be between 0 and 32".to_string(),
            });
        }
        Ok(Self { addr, prefix_bits })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_bits(&self) -> u8 {
        self.prefix_bits
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        is_incoming(addr, self.addr, self.prefix_bits)
    }
}

impl Default for LocalNet {
    fn default() -> Self {
        LocalNet::ANY
    }
}

impl fmt::Display for LocalNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_bits)
    }
}

impl FromStr for LocalNet {
    type Err = Error;

    /// Parses `a.b.c.d/len`. A bare address is taken as a /32.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidLocalNet {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (addr, bits) = match spec.trim().split_once('/') {
            Some((addr, bits)) => {
                let bits = bits
                    .parse::<u8>()
                    .map_err(|_| invalid("prefix length is not a number"))?;
                (addr, bits)
            }
            None => (spec.trim(), 32),
        };

        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| invalid("not an IPv4 address"))?;

        LocalNet::new(addr, bits).map_err(|_| invalid("prefix length must be between 0 and 32"))
    }
}

/// CIDR containment: does `addr` fall inside `net/prefix_bits`?
///
/// `prefix_bits == 0` always matches. A 32-bit shift by 32 is not defined, so
/// that case never reaches the mask computation.
pub fn is_incoming(addr: Ipv4Addr, net: Ipv4Addr, prefix_bits: u8) -> bool {
    if prefix_bits == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - u32::from(prefix_bits.min(32)));
    (u32::from(addr) ^ u32::from(net)) & mask == 0
}
