use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

/// IPv4 addresses live inside `::ffff:0:0/96`, so a v4 prefix length is offset by this much.
const V4_MAPPED_OFFSET: u8 = 96;
const V4_MAPPED_HEAD: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid prefix length `{0}`")]
    InvalidLength(String),
    #[error("prefix length {plen} exceeds {max}")]
    LengthOutOfRange { plen: u8, max: u8 },
}

/// A network prefix over a 16 byte address. IPv4 prefixes are stored IPv4-mapped.
///
/// Host bits past the prefix length are always zero, so equality is exact prefix matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde_with::SerializeDisplay, serde_with::DeserializeFromStr)
)]
pub struct Prefix {
    addr: [u8; 16],
    plen: u8,
}

impl Prefix {
    /// Builds a prefix from raw bytes, clearing host bits.
    pub fn new(addr: [u8; 16], plen: u8) -> Result<Self, PrefixError> {
        if plen > 128 {
            return Err(PrefixError::LengthOutOfRange { plen, max: 128 });
        }
        let mut addr = addr;
        for (i, byte) in addr.iter_mut().enumerate() {
            let bits = (plen as usize).saturating_sub(i * 8).min(8);
            *byte &= !(0xFFu8.checked_shr(bits as u32).unwrap_or(0));
        }
        Ok(Self { addr, plen })
    }

    /// Builds a prefix from an IP address, the length is relative to the address family.
    pub fn from_ip(ip: IpAddr, plen: u8) -> Result<Self, PrefixError> {
        match ip {
            IpAddr::V4(v4) => {
                if plen > 32 {
                    return Err(PrefixError::LengthOutOfRange { plen, max: 32 });
                }
                Self::new(v4.to_ipv6_mapped().octets(), plen + V4_MAPPED_OFFSET)
            }
            IpAddr::V6(v6) => Self::new(v6.octets(), plen),
        }
    }

    pub fn address(&self) -> &[u8; 16] {
        &self.addr
    }

    /// Prefix length over the full 16 byte address
    pub fn plen(&self) -> u8 {
        self.plen
    }

    pub fn is_v4(&self) -> bool {
        self.plen >= V4_MAPPED_OFFSET && self.addr[..12] == V4_MAPPED_HEAD
    }

    pub fn ip(&self) -> IpAddr {
        if self.is_v4() {
            IpAddr::V4(Ipv4Addr::new(self.addr[12], self.addr[13], self.addr[14], self.addr[15]))
        } else {
            IpAddr::V6(Ipv6Addr::from(self.addr))
        }
    }

    /// Prefix length relative to the address family, as it would be written by a user
    pub fn family_plen(&self) -> u8 {
        if self.is_v4() {
            self.plen - V4_MAPPED_OFFSET
        } else {
            self.plen
        }
    }

    /// Multicast, link-local, unspecified, loopback and the reserved IPv4 ranges.
    pub fn is_martian(&self) -> bool {
        let a = &self.addr;
        let plen = self.plen;
        (plen >= 8 && a[0] == 0xFF)
            || (plen >= 10 && a[0] == 0xFE && (a[1] & 0xC0) == 0x80)
            || (plen >= 128 && a[..15].iter().all(|b| *b == 0) && (a[15] == 0 || a[15] == 1))
            || (self.is_v4()
                && ((plen >= 104 && (a[12] == 127 || a[12] == 0))
                    || (plen >= 100 && (a[12] & 0xE0) == 0xE0)))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ip(), self.family_plen())
    }
}

impl FromStr for Prefix {
    type Err = PrefixError;

    /// Parses `addr/len`, or a bare address as a host route.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, plen) = match s.split_once('/') {
            Some((addr, plen)) => (addr, Some(plen)),
            None => (s, None),
        };
        let ip = IpAddr::from_str(addr.trim()).map_err(|_| PrefixError::InvalidAddress(addr.to_string()))?;
        let plen = match plen {
            Some(plen) => plen
                .trim()
                .parse::<u8>()
                .map_err(|_| PrefixError::InvalidLength(plen.to_string()))?,
            None if ip.is_ipv4() => 32,
            None => 128,
        };
        Self::from_ip(ip, plen)
    }
}
