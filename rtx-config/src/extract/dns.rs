//! Resolver settings, including domain-based server selection.
//!
//! `dns server select` lines mix optional positional fields whose meaning is
//! decided by token shape; [`classify_server_select`] reads them and
//! [`render_server_select`] writes them back in the same order.

use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::fields::{is_address, is_network};
use rtx_config_core::{CommandStream, ScopeId, TokenCursor};
use serde::Serialize;
use tracing::debug;

use super::{number, on_off};
use crate::registry::{to_json, Extractor};

/// Record types a server-select entry may be limited to.
pub const RECORD_TYPES: &[&str] = &["a", "aaaa", "ptr", "mx", "ns", "cname", "any"];

const MAX_SELECT_SERVERS: usize = 2;
const MAX_NAME_SERVERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsConfig {
    pub domain_lookup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    pub name_servers: Vec<String>,
    pub server_select: Vec<DnsServerSelect>,
    pub hosts: Vec<DnsHost>,
    /// `on` or `recursive`.
    pub service_on: bool,
    pub private_spoof: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            domain_lookup: true,
            domain_name: None,
            name_servers: Vec::new(),
            server_select: Vec::new(),
            hosts: Vec::new(),
            service_on: false,
            private_spoof: false,
        }
    }
}

/// One `dns server select` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsServerSelect {
    pub id: u32,
    pub servers: Vec<String>,
    pub edns: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    /// Domain pattern; `.` matches every name.
    pub query_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_pp: Option<u32>,
}

/// `dns static` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsHost {
    pub record_type: String,
    pub name: String,
    pub value: String,
}

struct Patterns {
    lookup: Regex,
    no_lookup: Regex,
    domain: Regex,
    server_select: Regex,
    server: Regex,
    static_host: Regex,
    service: Regex,
    spoof: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("static regex must compile");
    Patterns {
        lookup: re(r"^dns\s+domain\s+lookup\s+(on|off)$"),
        no_lookup: re(r"^no\s+dns\s+domain\s+lookup$"),
        domain: re(r"^dns\s+domain\s+(\S+)$"),
        server_select: re(r"^dns\s+server\s+select\s+(\d+)\s+(.+)$"),
        server: re(r"^dns\s+server\s+(.+)$"),
        static_host: re(r"^dns\s+static\s+(.+)$"),
        service: re(r"^dns\s+service\s+(on|off|recursive)$"),
        spoof: re(r"^dns\s+private\s+address\s+spoof\s+(on|off)$"),
    }
});

/// Read the global DNS settings. Returns `None` when no DNS command is present.
pub fn extract(stream: &CommandStream) -> Option<DnsConfig> {
    let p = &*PATTERNS;
    let lines = joined_global_lines(stream);
    let mut config = DnsConfig::default();
    let mut seen = false;

    for text in &lines {
        let text = text.as_str();
        let matched = if let Some(caps) = p.lookup.captures(text) {
            config.domain_lookup = on_off(&caps[1]);
            true
        } else if p.no_lookup.is_match(text) {
            config.domain_lookup = false;
            true
        } else if let Some(caps) = p.service.captures(text) {
            config.service_on = &caps[1] != "off";
            true
        } else if let Some(caps) = p.spoof.captures(text) {
            config.private_spoof = on_off(&caps[1]);
            true
        } else if let Some(caps) = p.server_select.captures(text) {
            if let Some(select) = number(&caps[1]).and_then(|id| classify_server_select(id, &caps[2])) {
                config.server_select.push(select);
            }
            true
        } else if let Some(caps) = p.server.captures(text) {
            config.name_servers = caps[1]
                .split_whitespace()
                .filter(|token| is_address(token))
                .take(MAX_NAME_SERVERS)
                .map(str::to_string)
                .collect();
            true
        } else if let Some(caps) = p.domain.captures(text) {
            config.domain_name = Some(caps[1].to_string());
            true
        } else if let Some(caps) = p.static_host.captures(text) {
            if let Some(host) = parse_static(&caps[1]) {
                config.hosts.push(host);
            }
            true
        } else {
            false
        };
        seen |= matched;
    }

    if !seen {
        return None;
    }
    config.server_select.sort_by_key(|s| s.id);
    debug!(
        servers = config.name_servers.len(),
        selects = config.server_select.len(),
        hosts = config.hosts.len(),
        "extracted dns settings"
    );
    Some(config)
}

/// Global command texts with device line-wrap continuations folded back in.
///
/// Long lines are wrapped so that a `key=value` token may continue on the
/// next line starting with `=`; those pieces are appended to the previous
/// DNS command.
fn joined_global_lines(stream: &CommandStream) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut last_was_dns = false;

    for cmd in stream.commands() {
        let text = cmd.text();
        if text.starts_with('=') && last_was_dns {
            if let Some(previous) = lines.last_mut() {
                previous.truncate(previous.trim_end().len());
                previous.push_str(text);
            }
            continue;
        }
        last_was_dns = cmd.scope == ScopeId::GLOBAL && is_dns_command(text);
        if cmd.scope == ScopeId::GLOBAL {
            lines.push(text.to_string());
        }
    }
    lines
}

fn is_dns_command(text: &str) -> bool {
    text.starts_with("dns ") || text.starts_with("no dns ")
}

/// `dns static [type] <name> <value> [ttl=n]`; the type defaults to `a`.
fn parse_static(rest: &str) -> Option<DnsHost> {
    let mut cursor = TokenCursor::new(rest);
    let record_type = match (cursor.peek(), cursor.peek_nth(2)) {
        (Some(first), Some(third)) if RECORD_TYPES.contains(&first) && !third.starts_with("ttl=") => {
            cursor.next();
            first
        }
        _ => "a",
    };
    let name = cursor.next()?;
    let value = cursor.next()?;
    Some(DnsHost {
        record_type: record_type.to_string(),
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Classify the arguments that follow `dns server select <id>`.
///
/// Fields are read left to right: one or two server addresses with optional
/// `edns=on|off` flags between them, an optional record type, the required
/// query pattern, an optional original-sender network and an optional
/// `restrict pp <n>`. Anything after that is ignored. Returns `None` when
/// there is no server or no query pattern.
pub fn classify_server_select(id: u32, rest: &str) -> Option<DnsServerSelect> {
    let mut cursor = TokenCursor::new(rest);
    let mut servers = Vec::new();
    let mut edns = false;

    loop {
        if servers.len() < MAX_SELECT_SERVERS {
            if let Some(server) = cursor.next_if(is_address) {
                servers.push(server.to_string());
                continue;
            }
        }
        if let Some(value) = cursor.next_value("edns") {
            edns = on_off(value);
            continue;
        }
        break;
    }
    if servers.is_empty() {
        return None;
    }

    let record_type = cursor
        .next_if(|token| RECORD_TYPES.contains(&token))
        .map(str::to_string);
    let query_pattern = cursor.next()?.to_string();
    let original_sender = cursor.next_if(is_network).map(str::to_string);
    let restrict_pp = if cursor.eat_sequence(&["restrict", "pp"]) {
        cursor.next().and_then(number)
    } else {
        None
    };

    Some(DnsServerSelect {
        id,
        servers,
        edns,
        record_type,
        query_pattern,
        original_sender,
        restrict_pp,
    })
}

/// Write an entry back as a `dns server select` command.
pub fn render_server_select(select: &DnsServerSelect) -> String {
    let mut parts = vec![
        "dns server select".to_string(),
        select.id.to_string(),
    ];
    parts.extend(select.servers.iter().cloned());
    if select.edns {
        parts.push("edns=on".to_string());
    }
    if let Some(record_type) = &select.record_type {
        parts.push(record_type.clone());
    }
    parts.push(select.query_pattern.clone());
    if let Some(sender) = &select.original_sender {
        parts.push(sender.clone());
    }
    if let Some(pp) = select.restrict_pp {
        parts.push(format!("restrict pp {pp}"));
    }
    parts.join(" ")
}

inventory::submit! {
    Extractor {
        name: "dns",
        summary: "Resolver settings and domain-based server selection",
        run: |stream| to_json("dns", &extract(stream)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rtx_config_core::parse;

    use super::{classify_server_select, extract, render_server_select, DnsHost, DnsServerSelect};

    fn select(id: u32, servers: &[&str], query: &str) -> DnsServerSelect {
        DnsServerSelect {
            id,
            servers: servers.iter().map(|s| s.to_string()).collect(),
            edns: false,
            record_type: None,
            query_pattern: query.to_string(),
            original_sender: None,
            restrict_pp: None,
        }
    }

    #[test]
    fn restrict_pp_with_wildcard_query() {
        let got = classify_server_select(5, "10.0.0.1 10.0.0.2 edns=on any . restrict pp 1");
        assert_eq!(
            got,
            Some(DnsServerSelect {
                edns: true,
                record_type: Some("any".to_string()),
                restrict_pp: Some(1),
                ..select(5, &["10.0.0.1", "10.0.0.2"], ".")
            })
        );
    }

    #[test]
    fn interleaved_flags_and_original_sender() {
        let got = classify_server_select(
            2,
            "192.168.1.1 edns=on 2001:db8::53 edns=on aaaa *.corp.example 192.168.10.0/24",
        );
        assert_eq!(
            got,
            Some(DnsServerSelect {
                edns: true,
                record_type: Some("aaaa".to_string()),
                original_sender: Some("192.168.10.0/24".to_string()),
                ..select(2, &["192.168.1.1", "2001:db8::53"], "*.corp.example")
            })
        );
    }

    #[test]
    fn dot_is_a_query_not_a_record_type() {
        let got = classify_server_select(1, "10.0.0.1 .");
        assert_eq!(got, Some(select(1, &["10.0.0.1"], ".")));
    }

    #[test]
    fn third_address_is_the_query_pattern() {
        let got = classify_server_select(1, "10.0.0.1 10.0.0.2 10.0.0.3");
        assert_eq!(got, Some(select(1, &["10.0.0.1", "10.0.0.2"], "10.0.0.3")));
    }

    #[test]
    fn incomplete_selects_are_inert() {
        assert_eq!(classify_server_select(1, "example.com"), None);
        assert_eq!(classify_server_select(1, "10.0.0.1 edns=on"), None);
        // the record type is taken before the query, leaving no query
        assert_eq!(classify_server_select(1, "10.0.0.1 edns=on any"), None);
    }

    #[test]
    fn rendered_selects_classify_back() {
        let records = [
            select(1, &["10.0.0.1"], "."),
            DnsServerSelect {
                edns: true,
                record_type: Some("a".to_string()),
                original_sender: Some("192.168.0.0-192.168.0.127".to_string()),
                restrict_pp: Some(3),
                ..select(9, &["10.0.0.1", "10.0.0.2"], "example.jp")
            },
        ];
        for record in records {
            let line = render_server_select(&record);
            let config = extract(&parse(&line)).expect("dns settings");
            assert_eq!(config.server_select, vec![record]);
        }
    }

    #[test]
    fn wrapped_edns_flag_is_rejoined() {
        let raw = "dns server select 500001 10.0.0.1 edns\n=on any example.local\ndns service recursive";
        let config = extract(&parse(raw)).expect("dns settings");
        assert!(config.server_select[0].edns);
        assert_eq!(config.server_select[0].query_pattern, "example.local");
        assert!(config.service_on);
    }

    #[test]
    fn general_settings() {
        let raw = "dns server 8.8.8.8 8.8.4.4\n\
                   dns domain branch.example\n\
                   dns domain lookup off\n\
                   dns static a router.branch.example 192.168.1.1\n\
                   dns static nas.branch.example 192.168.1.5\n\
                   dns private address spoof on";
        let config = extract(&parse(raw)).expect("dns settings");

        assert_eq!(config.name_servers, vec!["8.8.8.8", "8.8.4.4"]);
        assert_eq!(config.domain_name.as_deref(), Some("branch.example"));
        assert!(!config.domain_lookup);
        assert!(config.private_spoof);
        assert!(!config.service_on);
        assert_eq!(
            config.hosts,
            vec![
                DnsHost {
                    record_type: "a".to_string(),
                    name: "router.branch.example".to_string(),
                    value: "192.168.1.1".to_string(),
                },
                DnsHost {
                    record_type: "a".to_string(),
                    name: "nas.branch.example".to_string(),
                    value: "192.168.1.5".to_string(),
                },
            ]
        );
    }

    #[test]
    fn no_dns_commands() {
        assert_eq!(extract(&parse("ip lan1 address 192.168.1.1/24")), None);
        assert_eq!(extract(&parse("")), None);
    }
}
