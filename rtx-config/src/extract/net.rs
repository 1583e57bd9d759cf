use std::net::Ipv4Addr;

use rtx_config_core::fields::is_ipv4_shaped;

use super::ExtractError;

/// Dotted netmask for a prefix length, `None` past 32.
pub fn prefix_to_mask(len: u8) -> Option<Ipv4Addr> {
    if len > 32 {
        return None;
    }
    let bits = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
    Some(Ipv4Addr::from(bits))
}

/// Prefix length of a contiguous dotted netmask.
pub fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    (bits.checked_shl(ones).unwrap_or(0) == 0).then_some(ones as u8)
}

/// Resolve a route destination into `(prefix, mask)`.
///
/// Accepts `default`, `a.b.c.d/len` and `a.b.c.d/m.m.m.m`. A bare address is a
/// host route.
pub fn parse_destination(token: &str, line: usize) -> Result<(Ipv4Addr, Ipv4Addr), ExtractError> {
    if token == "default" {
        return Ok((Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED));
    }

    let (addr, mask) = match token.split_once('/') {
        Some((addr, mask)) => (addr, Some(mask)),
        None => (token, None),
    };
    let prefix = parse_addr(addr, line)?;

    let mask = match mask {
        None => Ipv4Addr::BROADCAST,
        Some(mask) if mask.contains('.') => {
            let parsed = parse_addr(mask, line)?;
            mask_to_prefix(parsed).ok_or_else(|| ExtractError::InvalidPrefix {
                line,
                value: mask.to_string(),
            })?;
            parsed
        }
        Some(len) => parse_prefix_len(len, line)?,
    };

    Ok((prefix, mask))
}

/// Parse a prefix length and return its netmask.
pub fn parse_prefix_len(token: &str, line: usize) -> Result<Ipv4Addr, ExtractError> {
    token
        .parse::<u8>()
        .ok()
        .and_then(prefix_to_mask)
        .ok_or_else(|| ExtractError::InvalidPrefix {
            line,
            value: token.to_string(),
        })
}

pub fn parse_addr(token: &str, line: usize) -> Result<Ipv4Addr, ExtractError> {
    token.parse().map_err(|_| ExtractError::InvalidAddress {
        line,
        value: token.to_string(),
    })
}

/// Split `start-end` into two addresses.
pub fn parse_range(token: &str, line: usize) -> Result<(Ipv4Addr, Ipv4Addr), ExtractError> {
    let invalid = || ExtractError::InvalidRange {
        line,
        value: token.to_string(),
    };
    let (start, end) = token.split_once('-').ok_or_else(invalid)?;
    let start: Ipv4Addr = start.parse().map_err(|_| invalid())?;
    let end: Ipv4Addr = end.parse().map_err(|_| invalid())?;
    if start > end {
        return Err(invalid());
    }
    Ok((start, end))
}

/// Normalize a MAC address to lowercase colon-separated form.
///
/// Colons, hyphens, dots and whitespace are ignored as separators; exactly twelve
/// hex digits must remain.
pub fn normalize_mac(raw: &str, line: usize) -> Result<String, ExtractError> {
    let hex: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ExtractError::InvalidMac {
            line,
            value: raw.trim().to_string(),
        });
    }

    let lower = hex.to_ascii_lowercase();
    let pairs: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(pairs.join(":"))
}

/// Whether a token names an IPv4 address in dotted form.
pub fn looks_like_ipv4(token: &str) -> bool {
    is_ipv4_shaped(token)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::{mask_to_prefix, normalize_mac, parse_destination, parse_range, prefix_to_mask};
    use crate::extract::ExtractError;

    #[test]
    fn converts_prefix_lengths() {
        assert_eq!(prefix_to_mask(0), Some(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(prefix_to_mask(24), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(prefix_to_mask(32), Some(Ipv4Addr::BROADCAST));
        assert_eq!(prefix_to_mask(33), None);
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 240, 0)), Some(20));
        assert_eq!(mask_to_prefix(Ipv4Addr::BROADCAST), Some(32));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 0, 255, 0)), None);
    }

    #[test]
    fn route_destinations() {
        assert_eq!(
            parse_destination("default", 1),
            Ok((Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED))
        );
        assert_eq!(
            parse_destination("10.10.0.0/16", 1),
            Ok((Ipv4Addr::new(10, 10, 0, 0), Ipv4Addr::new(255, 255, 0, 0)))
        );
        assert_eq!(
            parse_destination("10.10.0.0/255.255.255.0", 1),
            Ok((Ipv4Addr::new(10, 10, 0, 0), Ipv4Addr::new(255, 255, 255, 0)))
        );
        assert_eq!(
            parse_destination("192.0.2.1", 1),
            Ok((Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::BROADCAST))
        );
        assert_eq!(
            parse_destination("10.0.0.0/40", 7),
            Err(ExtractError::InvalidPrefix {
                line: 7,
                value: "40".to_string()
            })
        );
    }

    #[test]
    fn ranges_must_be_ordered() {
        assert!(parse_range("192.168.1.20-192.168.1.99", 1).is_ok());
        assert!(parse_range("192.168.1.99-192.168.1.20", 1).is_err());
        assert!(parse_range("192.168.1.20", 1).is_err());
    }

    #[test]
    fn macs_normalize_from_every_device_spelling() {
        for raw in ["00:A0:DE:aa:bb:cc", "00 a0 de aa bb cc", "00-a0-de-aa-bb-cc", "00a0.deaa.bbcc"] {
            assert_eq!(normalize_mac(raw, 1).as_deref(), Ok("00:a0:de:aa:bb:cc"));
        }
        assert_eq!(
            normalize_mac("00:a0:de:aa:bb", 9),
            Err(ExtractError::InvalidMac {
                line: 9,
                value: "00:a0:de:aa:bb".to_string()
            })
        );
        assert!(normalize_mac("zz:a0:de:aa:bb:cc", 1).is_err());
    }
}
