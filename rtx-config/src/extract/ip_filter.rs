use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::{CommandStream, ScopeKey, ScopeKind, TokenCursor};
use serde::Serialize;

use super::number;
use crate::registry::{to_json, Extractor};

/// Static packet filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpFilter {
    pub number: u32,
    pub action: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
    pub established: bool,
}

/// Stateful inspection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpFilterDynamic {
    pub number: u32,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub syslog: bool,
}

/// Filter list applied to an interface in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecureFilter {
    pub interface: String,
    pub direction: String,
    pub filters: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dynamic: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IpFilterSet {
    pub filters: Vec<IpFilter>,
    pub dynamic: Vec<IpFilterDynamic>,
    pub secure_filters: Vec<SecureFilter>,
}

struct Patterns {
    filter: Regex,
    dynamic: Regex,
    secure: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    filter: Regex::new(r"^ip\s+filter\s+(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)(.*)$")
        .expect("static regex must compile"),
    dynamic: Regex::new(r"^ip\s+filter\s+dynamic\s+(\d+)\s+(\S+)\s+(\S+)\s+(\S+)(.*)$")
        .expect("static regex must compile"),
    secure: Regex::new(r"^ip\s+(\S+)\s+secure\s+filter\s+(in|out)\s+(.+)$")
        .expect("static regex must compile"),
});

/// Collect static and dynamic filters, plus the interface bindings that use them.
///
/// Secure-filter bindings are read from the global scope and from numbered PP
/// scopes, where `ip pp secure filter` refers to the selected PP.
pub fn extract(stream: &CommandStream) -> IpFilterSet {
    let p = &*PATTERNS;
    let mut filters = BTreeMap::new();
    let mut dynamic = BTreeMap::new();
    let mut secure = Vec::new();

    for cmd in stream.global_commands() {
        let text = cmd.text();

        if let Some(caps) = p.dynamic.captures(text) {
            let Some(number) = number(&caps[1]) else { continue };
            let mut rest = TokenCursor::new(&caps[5]);
            dynamic.insert(
                number,
                IpFilterDynamic {
                    number,
                    source: caps[2].to_string(),
                    destination: caps[3].to_string(),
                    protocol: caps[4].to_string(),
                    syslog: has_syslog_on(&mut rest),
                },
            );
        } else if let Some(caps) = p.filter.captures(text) {
            let Some(number) = number(&caps[1]) else { continue };
            filters.insert(number, parse_static(number, &caps));
        } else if let Some(caps) = p.secure.captures(text) {
            if !matches!(&caps[1], "pp" | "tunnel") {
                secure.push(parse_secure(caps[1].to_string(), &caps[2], &caps[3]));
            }
        }
    }

    for cmd in stream.commands_in_kind(ScopeKind::Pp) {
        let Some(caps) = p.secure.captures(cmd.text()) else {
            continue;
        };
        if &caps[1] != "pp" {
            continue;
        }
        let interface = match stream.key_of(cmd) {
            ScopeKey::Pp { name: Some(name), .. } => format!("pp {name}"),
            ScopeKey::Pp { id, .. } => format!("pp {id}"),
            _ => continue,
        };
        secure.push(parse_secure(interface, &caps[2], &caps[3]));
    }

    IpFilterSet {
        filters: filters.into_values().collect(),
        dynamic: dynamic.into_values().collect(),
        secure_filters: secure,
    }
}

fn parse_static(number: u32, caps: &regex::Captures<'_>) -> IpFilter {
    let mut rest = TokenCursor::new(caps.get(6).map_or("", |m| m.as_str()));
    let mut ports = Vec::new();
    let mut established = false;
    while let Some(token) = rest.next() {
        if token == "established" {
            established = true;
        } else if ports.len() < 2 {
            ports.push(token.to_string());
        }
    }
    let mut ports = ports.into_iter();

    IpFilter {
        number,
        action: caps[2].to_string(),
        source: caps[3].to_string(),
        destination: caps[4].to_string(),
        protocol: caps[5].to_string(),
        source_port: ports.next(),
        destination_port: ports.next(),
        established,
    }
}

fn has_syslog_on(rest: &mut TokenCursor<'_>) -> bool {
    let mut syslog = false;
    while !rest.is_done() {
        if rest.eat_sequence(&["syslog", "on"]) {
            syslog = true;
        } else {
            rest.next();
        }
    }
    syslog
}

/// `<n> <n> ... [dynamic <n> ...]`
pub(crate) fn parse_secure(interface: String, direction: &str, list: &str) -> SecureFilter {
    let mut cursor = TokenCursor::new(list);
    let mut filters = Vec::new();
    let mut dynamic = Vec::new();
    let mut in_dynamic = false;

    while let Some(token) = cursor.next() {
        if token == "dynamic" {
            in_dynamic = true;
            continue;
        }
        let Some(n) = number(token) else { continue };
        if in_dynamic {
            dynamic.push(n);
        } else {
            filters.push(n);
        }
    }

    SecureFilter {
        interface,
        direction: direction.to_string(),
        filters,
        dynamic,
    }
}

inventory::submit! {
    Extractor {
        name: "ip_filters",
        summary: "Static and dynamic IP filters with interface bindings",
        run: |stream| to_json("ip_filters", &extract(stream)),
    }
}
