use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::fields::is_address;
use rtx_config_core::{CommandStream, TokenCursor};
use serde::Serialize;
use tracing::debug;

use super::net::{parse_addr, parse_prefix_len, parse_range};
use super::{number, ExtractError};
use crate::registry::{to_json, Extractor};

/// DHCP server scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpScope {
    pub id: u32,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    pub prefix: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_expire: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<AddressRange>,
    pub options: DhcpScopeOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

/// Values from `dhcp scope option <id> key=value ...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DhcpScopeOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub router: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, String>,
}

struct Patterns {
    scope: Regex,
    option: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    scope: Regex::new(r"^dhcp\s+scope\s+(\d+)\s+(.+)$").expect("static regex must compile"),
    option: Regex::new(r"^dhcp\s+scope\s+option\s+(\d+)\s+(.+)$")
        .expect("static regex must compile"),
});

const SCOPE_KEYWORDS: &[&str] = &["gateway", "dns", "lease", "domain", "expire", "maxexpire", "except"];

#[derive(Debug, Default)]
struct ScopeBuilder {
    range: Option<(Ipv4Addr, Ipv4Addr, u8)>,
    gateway: Option<Ipv4Addr>,
    dns_servers: Vec<String>,
    lease: Option<u32>,
    domain: Option<String>,
    expire: Option<String>,
    max_expire: Option<String>,
    exclusions: Vec<AddressRange>,
    options: DhcpScopeOptions,
}

/// Collect DHCP scopes, folding option and exclusion lines into their scope.
///
/// Options or exclusions for a scope id that never gets an address range are dropped.
pub fn extract(stream: &CommandStream) -> Result<Vec<DhcpScope>, ExtractError> {
    let p = &*PATTERNS;
    let mut scopes: BTreeMap<u32, ScopeBuilder> = BTreeMap::new();

    for cmd in stream.global_commands() {
        let text = cmd.text();
        let line = cmd.line_number();

        if let Some(caps) = p.option.captures(text) {
            let Some(id) = number(&caps[1]) else { continue };
            apply_options(&mut scopes.entry(id).or_default().options, &caps[2]);
            continue;
        }

        if let Some(caps) = p.scope.captures(text) {
            let Some(id) = number(&caps[1]) else { continue };
            let builder = scopes.entry(id).or_default();
            let mut cursor = TokenCursor::new(caps.get(2).map_or("", |m| m.as_str()));

            if !cursor.eat("except") {
                let Some(spec) = cursor.next() else { continue };
                builder.range = Some(parse_scope_range(spec, line)?);
            } else {
                read_exclusions(&mut cursor, builder, line)?;
            }
            read_scope_options(&mut cursor, builder, line)?;
        }
    }

    let mut out = Vec::with_capacity(scopes.len());
    for (id, builder) in scopes {
        let Some((range_start, range_end, prefix)) = builder.range else {
            debug!(scope = id, "dropping dhcp scope settings without an address range");
            continue;
        };
        out.push(DhcpScope {
            id,
            range_start,
            range_end,
            prefix,
            gateway: builder.gateway,
            dns_servers: builder.dns_servers,
            lease: builder.lease,
            domain: builder.domain,
            expire: builder.expire,
            max_expire: builder.max_expire,
            exclusions: builder.exclusions,
            options: builder.options,
        });
    }
    Ok(out)
}

/// `start-end/prefix`
fn parse_scope_range(spec: &str, line: usize) -> Result<(Ipv4Addr, Ipv4Addr, u8), ExtractError> {
    let (range, prefix) = spec.split_once('/').ok_or_else(|| ExtractError::InvalidPrefix {
        line,
        value: spec.to_string(),
    })?;
    let (start, end) = parse_range(range, line)?;
    parse_prefix_len(prefix, line)?;
    let prefix = prefix.parse().map_err(|_| ExtractError::InvalidPrefix {
        line,
        value: prefix.to_string(),
    })?;
    Ok((start, end, prefix))
}

fn read_scope_options(
    cursor: &mut TokenCursor<'_>,
    builder: &mut ScopeBuilder,
    line: usize,
) -> Result<(), ExtractError> {
    while let Some(keyword) = cursor.next() {
        match keyword {
            "gateway" => {
                if let Some(addr) = cursor.next() {
                    builder.gateway = Some(parse_addr(addr, line)?);
                }
            }
            "dns" => {
                while let Some(addr) = cursor.next_if(is_address) {
                    builder.dns_servers.push(addr.to_string());
                }
            }
            "lease" => builder.lease = cursor.next().and_then(number),
            "domain" => builder.domain = cursor.next().map(str::to_string),
            "expire" => builder.expire = cursor.next().map(str::to_string),
            "maxexpire" => builder.max_expire = cursor.next().map(str::to_string),
            "except" => read_exclusions(cursor, builder, line)?,
            _ => {}
        }
    }
    Ok(())
}

fn read_exclusions(
    cursor: &mut TokenCursor<'_>,
    builder: &mut ScopeBuilder,
    line: usize,
) -> Result<(), ExtractError> {
    while let Some(token) = cursor.next_if(|t| !SCOPE_KEYWORDS.contains(&t)) {
        let (start, end) = if token.contains('-') {
            parse_range(token, line)?
        } else {
            let addr = parse_addr(token, line)?;
            (addr, addr)
        };
        builder.exclusions.push(AddressRange { start, end });
    }
    Ok(())
}

fn apply_options(options: &mut DhcpScopeOptions, rest: &str) {
    let mut cursor = TokenCursor::new(rest);
    while let Some(token) = cursor.next() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let list = || value.split(',').filter(|v| !v.is_empty()).map(str::to_string);
        match key {
            "dns" => options.dns.extend(list()),
            "router" | "gateway" => options.router.extend(list()),
            "domain" => options.domain = Some(value.to_string()),
            _ => {
                options.other.insert(key.to_string(), value.to_string());
            }
        }
    }
}

inventory::submit! {
    Extractor {
        name: "dhcp_scopes",
        summary: "DHCP server scopes, exclusions and options",
        run: |stream| to_json("dhcp_scopes", &extract(stream)?),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;
    use rtx_config_core::parse;

    use super::{extract, AddressRange};
    use crate::extract::ExtractError;

    #[test]
    fn scope_with_inline_options() {
        let scopes = extract(&parse(
            "dhcp scope 1 192.168.1.20-192.168.1.99/24 gateway 192.168.1.1 dns 192.168.1.1 8.8.8.8 lease 72 domain example.jp expire 24:00 maxexpire 72:00",
        ))
        .expect("extract");

        assert_eq!(scopes.len(), 1);
        let scope = &scopes[0];
        assert_eq!(scope.id, 1);
        assert_eq!(scope.range_start, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(scope.range_end, Ipv4Addr::new(192, 168, 1, 99));
        assert_eq!(scope.prefix, 24);
        assert_eq!(scope.gateway, Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(scope.dns_servers, vec!["192.168.1.1", "8.8.8.8"]);
        assert_eq!(scope.lease, Some(72));
        assert_eq!(scope.domain.as_deref(), Some("example.jp"));
        assert_eq!(scope.expire.as_deref(), Some("24:00"));
        assert_eq!(scope.max_expire.as_deref(), Some("72:00"));
    }

    #[test]
    fn option_and_except_lines_merge_regardless_of_order() {
        let raw = "dhcp scope option 2 dns=10.0.0.1,10.0.0.2 router=10.0.0.254 ntp=10.0.0.3\ndhcp scope 2 except 10.0.0.50-10.0.0.59 10.0.0.70\ndhcp scope 2 10.0.0.10-10.0.0.200/24";
        let scopes = extract(&parse(raw)).expect("extract");

        assert_eq!(scopes.len(), 1);
        let scope = &scopes[0];
        assert_eq!(scope.options.dns, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(scope.options.router, vec!["10.0.0.254"]);
        assert_eq!(scope.options.other.get("ntp").map(String::as_str), Some("10.0.0.3"));
        assert_eq!(
            scope.exclusions,
            vec![
                AddressRange {
                    start: Ipv4Addr::new(10, 0, 0, 50),
                    end: Ipv4Addr::new(10, 0, 0, 59)
                },
                AddressRange {
                    start: Ipv4Addr::new(10, 0, 0, 70),
                    end: Ipv4Addr::new(10, 0, 0, 70)
                },
            ]
        );
    }

    #[test]
    fn bindings_and_orphan_options_do_not_create_scopes() {
        let raw = "dhcp scope bind 1 192.168.1.30 01 00:a0:de:aa:bb:cc\ndhcp scope option 9 dns=1.1.1.1";
        assert!(extract(&parse(raw)).expect("extract").is_empty());
    }

    #[test]
    fn malformed_range_fails() {
        let err = extract(&parse("dhcp scope 1 192.168.1.99-192.168.1.20/24")).unwrap_err();
        assert_eq!(
            err,
            ExtractError::InvalidRange {
                line: 1,
                value: "192.168.1.99-192.168.1.20".to_string()
            }
        );
    }

    #[test]
    fn missing_prefix_fails() {
        let err = extract(&parse("dhcp scope 1 192.168.1.20-192.168.1.99")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPrefix { line: 1, .. }));
    }
}
