use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::CommandStream;
use serde::Serialize;

use super::net::{normalize_mac, parse_addr};
use super::{number, ExtractError};
use crate::registry::{to_json, Extractor};

/// Static DHCP reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpBinding {
    pub scope_id: u32,
    pub address: Ipv4Addr,
    /// Lowercase colon-separated MAC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Raw client identifier, lowercase colon-separated octets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// MAC was given with the `01` hardware-type prefix, so the device matches on
    /// the client identifier option rather than the frame source.
    pub use_client_identifier: bool,
}

static BIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^dhcp\s+scope\s+bind\s+(\d+)\s+(\S+)\s+(.+)$").expect("static regex must compile")
});

/// Collect `dhcp scope bind` reservations. A later binding for the same
/// scope and address replaces the earlier one.
pub fn extract(stream: &CommandStream) -> Result<Vec<DhcpBinding>, ExtractError> {
    let mut bindings: BTreeMap<(u32, Ipv4Addr), DhcpBinding> = BTreeMap::new();

    for cmd in stream.global_commands() {
        let Some(caps) = BIND.captures(cmd.text()) else {
            continue;
        };
        let Some(scope_id) = number(&caps[1]) else {
            continue;
        };
        let line = cmd.line_number();
        let address = parse_addr(&caps[2], line)?;
        let binding = parse_identifier(scope_id, address, &caps[3], line)?;
        bindings.insert((scope_id, address), binding);
    }

    Ok(bindings.into_values().collect())
}

fn parse_identifier(
    scope_id: u32,
    address: Ipv4Addr,
    rest: &str,
    line: usize,
) -> Result<DhcpBinding, ExtractError> {
    let mut binding = DhcpBinding {
        scope_id,
        address,
        mac: None,
        client_id: None,
        use_client_identifier: false,
    };

    if let Some(id) = rest.strip_prefix("client-id") {
        binding.client_id = Some(normalize_client_id(id, line)?);
        return Ok(binding);
    }

    let mac = if let Some(mac) = rest.strip_prefix("ethernet ") {
        mac
    } else if let Some(mac) = rest.strip_prefix("01 ") {
        binding.use_client_identifier = true;
        mac
    } else {
        rest
    };
    binding.mac = Some(normalize_mac(mac, line)?);
    Ok(binding)
}

fn normalize_client_id(raw: &str, line: usize) -> Result<String, ExtractError> {
    let hex: String = raw
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect();
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ExtractError::InvalidMac {
            line,
            value: raw.trim().to_string(),
        });
    }
    let lower = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..lower.len() / 2).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

inventory::submit! {
    Extractor {
        name: "dhcp_bindings",
        summary: "Static DHCP address reservations",
        run: |stream| to_json("dhcp_bindings", &extract(stream)?),
    }
}
