//! Private, link-local, reserved and multicast ("bogon") address ranges.
//!
//! A bogon is an address with no meaningful public GeoIP answer: RFC 1918
//! and RFC 4193 private space, RFC 3927 link-local space, loopback,
//! multicast, and the IETF special-purpose blocks of RFC 5735/6890.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::matcher::strip_zone_index;

/// IPv4 special-purpose blocks as (network, prefix length).
const IPV4_BOGONS: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),       // "this" network
    (Ipv4Addr::new(10, 0, 0, 0), 8),      // RFC 1918
    (Ipv4Addr::new(100, 64, 0, 0), 10),   // carrier-grade NAT
    (Ipv4Addr::new(127, 0, 0, 0), 8),     // loopback
    (Ipv4Addr::new(169, 254, 0, 0), 16),  // link-local
    (Ipv4Addr::new(172, 16, 0, 0), 12),   // RFC 1918
    (Ipv4Addr::new(192, 0, 0, 0), 24),    // IETF protocol assignments
    (Ipv4Addr::new(192, 0, 2, 0), 24),    // TEST-NET-1
    (Ipv4Addr::new(192, 88, 99, 0), 24),  // 6to4 relay anycast
    (Ipv4Addr::new(192, 168, 0, 0), 16),  // RFC 1918
    (Ipv4Addr::new(198, 18, 0, 0), 15),   // benchmarking
    (Ipv4Addr::new(198, 51, 100, 0), 24), // TEST-NET-2
    (Ipv4Addr::new(203, 0, 113, 0), 24),  // TEST-NET-3
    (Ipv4Addr::new(224, 0, 0, 0), 4),     // multicast
    (Ipv4Addr::new(240, 0, 0, 0), 4),     // reserved, includes broadcast
];

/// Blocks carved out of 2000::/3 global unicast space.
const IPV6_BOGONS: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 23),     // IETF protocol assignments
    (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32), // documentation
];

#[inline]
fn in_v4_block(ip: Ipv4Addr, net: Ipv4Addr, prefix: u8) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0);
    (u32::from(ip) & mask) == (u32::from(net) & mask)
}

#[inline]
fn in_v6_block(ip: Ipv6Addr, net: Ipv6Addr, prefix: u8) -> bool {
    let mask = u128::MAX.checked_shl(128 - prefix as u32).unwrap_or(0);
    (u128::from(ip) & mask) == (u128::from(net) & mask)
}

/// Whether an IPv4 address is in a bogon range.
pub fn is_bogon_v4(ip: Ipv4Addr) -> bool {
    IPV4_BOGONS
        .iter()
        .any(|&(net, prefix)| in_v4_block(ip, net, prefix))
}

/// Whether an IPv6 address is in a bogon range.
///
/// IPv4-mapped addresses (`::ffff:a.b.c.d`) are judged by the embedded
/// IPv4 address. Everything outside 2000::/3 is unassigned, reserved,
/// unique-local (fc00::/7), link-local (fe80::/10) or multicast (ff00::/8).
pub fn is_bogon_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_bogon_v4(v4);
    }
    let global_unicast = (ip.segments()[0] & 0xe000) == 0x2000;
    if !global_unicast {
        return true;
    }
    IPV6_BOGONS
        .iter()
        .any(|&(net, prefix)| in_v6_block(ip, net, prefix))
}

/// Whether an address is a bogon.
///
/// ```
/// use ip_extract::is_bogon;
///
/// assert!(is_bogon("192.168.1.1".parse().unwrap()));
/// assert!(!is_bogon("8.8.8.8".parse().unwrap()));
/// ```
#[inline]
pub fn is_bogon(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_bogon_v4(v4),
        IpAddr::V6(v6) => is_bogon_v6(v6),
    }
}

/// Parse an address as produced by the matcher.
///
/// Accepts what [`std::net::IpAddr::from_str`] rejects but the matcher
/// reports verbatim: IPv4 octets with leading zeros (`010.001.1.1`) and
/// IPv6 zone indexes (`fe80::1%eth0`).
pub fn parse_address(address: &str) -> Option<IpAddr> {
    let address = strip_zone_index(address);
    if let Some(v4) = parse_dotted_quad(address.as_bytes()) {
        return Some(IpAddr::V4(v4));
    }
    address.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
}

/// Classify an address string. Unparseable input is not a bogon.
#[inline]
pub fn is_bogon_str(address: &str) -> bool {
    parse_address(address).is_some_and(is_bogon)
}

/// Parse a dotted-quad, allowing up to three digits (leading zeros included)
/// per octet.
///
/// ```
/// use ip_extract::parse_dotted_quad;
///
/// assert_eq!(parse_dotted_quad(b"010.0.0.1"), Some("10.0.0.1".parse().unwrap()));
/// assert_eq!(parse_dotted_quad(b"256.1.1.1"), None);
/// ```
pub fn parse_dotted_quad(bytes: &[u8]) -> Option<Ipv4Addr> {
    if bytes.len() < 7 || bytes.len() > 15 {
        return None;
    }
    let mut octets = [0u8; 4];
    let mut octet_idx = 0;
    let mut current_val = 0u16;
    let mut digits_in_octet = 0;
    for &b in bytes {
        match b {
            b'.' => {
                if digits_in_octet == 0 || octet_idx == 3 {
                    return None;
                }
                octets[octet_idx] = current_val as u8;
                octet_idx += 1;
                current_val = 0;
                digits_in_octet = 0;
            }
            b'0'..=b'9' => {
                digits_in_octet += 1;
                current_val = current_val * 10 + (b - b'0') as u16;
                if digits_in_octet > 3 || current_val > 255 {
                    return None;
                }
            }
            _ => return None,
        }
    }
    if octet_idx != 3 || digits_in_octet == 0 {
        return None;
    }
    octets[3] = current_val as u8;
    Some(Ipv4Addr::from(octets))
}
