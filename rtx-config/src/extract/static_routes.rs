use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::{CommandStream, TokenCursor};
use serde::Serialize;

use super::net::{looks_like_ipv4, parse_destination};
use super::ExtractError;
use crate::registry::{to_json, Extractor};

/// IPv4 static route, one per destination network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRoute {
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hops: Vec<NextHop>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextHop {
    /// Gateway address when the hop is an IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    /// Interface hop such as `pp 1`, `tunnel 2`, `dhcp lan2`, `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub distance: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<u32>,
    pub hide: bool,
    pub keepalive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for NextHop {
    fn default() -> Self {
        Self {
            gateway: None,
            interface: None,
            distance: 1,
            filters: Vec::new(),
            hide: false,
            keepalive: false,
            name: None,
        }
    }
}

static ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ip\s+route\s+(\S+)\s+gateway\s+(.+)$").expect("static regex must compile")
});

const HOP_OPTIONS: &[&str] = &["weight", "filter", "hide", "keepalive", "name", "gateway"];

/// Collect `ip route` commands from the global scope.
///
/// Repeated lines for the same destination and ECMP `gateway` lists on one line
/// all append to the same route.
pub fn extract(stream: &CommandStream) -> Result<Vec<StaticRoute>, ExtractError> {
    let mut routes: BTreeMap<(Ipv4Addr, Ipv4Addr), StaticRoute> = BTreeMap::new();

    for cmd in stream.global_commands() {
        let Some(caps) = ROUTE.captures(cmd.text()) else {
            continue;
        };
        let (prefix, mask) = parse_destination(&caps[1], cmd.line_number())?;

        routes
            .entry((prefix, mask))
            .or_insert_with(|| StaticRoute {
                prefix,
                mask,
                next_hops: Vec::new(),
            })
            .next_hops
            .extend(parse_hops(&caps[2]));
    }

    Ok(routes.into_values().collect())
}

/// Parse the text following the first `gateway` keyword.
pub fn parse_hops(spec: &str) -> Vec<NextHop> {
    let mut cursor = TokenCursor::new(spec);
    let mut hops = Vec::new();

    while let Some(hop) = parse_hop(&mut cursor) {
        hops.push(hop);
        if !cursor.eat("gateway") {
            break;
        }
    }
    hops
}

fn parse_hop(cursor: &mut TokenCursor<'_>) -> Option<NextHop> {
    let first = cursor.next()?;
    let mut hop = NextHop::default();

    match first {
        "pp" | "tunnel" | "dhcp" => {
            let target = cursor.next_if(|t| !HOP_OPTIONS.contains(&t));
            hop.interface = Some(match target {
                Some(target) => format!("{first} {target}"),
                None => first.to_string(),
            });
        }
        addr if looks_like_ipv4(addr) => match addr.parse() {
            Ok(gateway) => hop.gateway = Some(gateway),
            Err(_) => hop.interface = Some(addr.to_string()),
        },
        other => hop.interface = Some(other.to_string()),
    }

    while let Some(token) = cursor.peek() {
        if token == "gateway" {
            break;
        }
        cursor.next();
        match token {
            "weight" => {
                if let Some(weight) = cursor.next_if(is_number).and_then(|n| n.parse().ok()) {
                    hop.distance = weight;
                }
            }
            "filter" => {
                while let Some(n) = cursor.next_if(is_number) {
                    if let Ok(n) = n.parse() {
                        hop.filters.push(n);
                    }
                }
            }
            "hide" => hop.hide = true,
            "keepalive" => {
                hop.keepalive = true;
                cursor.next_if(is_number);
            }
            "name" => {
                let mut parts = Vec::new();
                while let Some(part) = cursor.next_if(|t| !HOP_OPTIONS.contains(&t)) {
                    parts.push(part);
                }
                if !parts.is_empty() {
                    hop.name = Some(parts.join(" "));
                }
            }
            _ => {}
        }
    }

    Some(hop)
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

inventory::submit! {
    Extractor {
        name: "static_routes",
        summary: "Static IPv4 routes with their next hops",
        run: |stream| to_json("static_routes", &extract(stream)?),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;
    use rtx_config_core::parse;

    use super::{extract, parse_hops, NextHop};
    use crate::extract::ExtractError;

    #[test]
    fn default_route_via_pp() {
        let routes = extract(&parse("ip route default gateway pp 1")).expect("extract");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, Ipv4Addr::UNSPECIFIED);
        assert_eq!(routes[0].mask, Ipv4Addr::UNSPECIFIED);
        assert_eq!(routes[0].next_hops[0].interface.as_deref(), Some("pp 1"));
        assert_eq!(routes[0].next_hops[0].distance, 1);
    }

    #[test]
    fn ecmp_and_repeated_lines_merge() {
        let raw = "ip route 10.10.0.0/16 gateway 192.168.1.254 weight 2 gateway 192.168.1.253\nip route 10.10.0.0/255.255.0.0 gateway tunnel 4 hide";
        let routes = extract(&parse(raw)).expect("extract");

        assert_eq!(routes.len(), 1);
        let hops = &routes[0].next_hops;
        assert_eq!(hops.len(), 3);
        assert_eq!(hops[0].gateway, Some(Ipv4Addr::new(192, 168, 1, 254)));
        assert_eq!(hops[0].distance, 2);
        assert_eq!(hops[1].gateway, Some(Ipv4Addr::new(192, 168, 1, 253)));
        assert_eq!(hops[1].distance, 1);
        assert_eq!(hops[2].interface.as_deref(), Some("tunnel 4"));
        assert!(hops[2].hide);
    }

    #[test]
    fn hop_options() {
        assert_eq!(
            parse_hops("null filter 10 11 keepalive 3 name backup path"),
            vec![NextHop {
                interface: Some("null".to_string()),
                filters: vec![10, 11],
                keepalive: true,
                name: Some("backup path".to_string()),
                ..NextHop::default()
            }]
        );
    }

    #[test]
    fn routes_inside_scopes_and_negations_are_ignored() {
        let raw = "no ip route 10.0.0.0/8 gateway null\npp select 1\n ip route default gateway pp 1";
        assert!(extract(&parse(raw)).expect("extract").is_empty());
    }

    #[test]
    fn malformed_prefix_names_the_line() {
        let err = extract(&parse("\nip route 10.0.0.0/33 gateway null")).unwrap_err();
        assert_eq!(
            err,
            ExtractError::InvalidPrefix {
                line: 2,
                value: "33".to_string()
            }
        );
    }

    #[test]
    fn output_is_ordered_by_destination() {
        let raw = "ip route 192.168.0.0/24 gateway null\nip route 10.0.0.0/8 gateway null\nip route default gateway pp 1";
        let prefixes: Vec<_> = extract(&parse(raw))
            .expect("extract")
            .into_iter()
            .map(|r| r.prefix.to_string())
            .collect();
        assert_eq!(prefixes, vec!["0.0.0.0", "10.0.0.0", "192.168.0.0"]);
    }
}
