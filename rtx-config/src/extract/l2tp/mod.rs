//! L2TP tunnels assembled from two sibling scopes.
//!
//! A `tunnel select N` block carries encapsulation, endpoints and the nested
//! IPsec association, while the `pp select anonymous` block that names the
//! tunnel through `pp bind tunnelN` carries authentication and the address pool
//! handed to remote clients. Both blocks are scanned independently and then
//! combined per tunnel id by [`merge::merge`].

pub mod merge;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::{CommandStream, ScopeKey, ScopeKind};
use serde::Serialize;
use tracing::{debug, warn};

use self::merge::Partial;
use super::{number, on_off};
use crate::registry::{to_json, Extractor};

/// L2TPv2 LNS or L2TPv3 pseudo-wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpTunnel {
    /// Tunnel id, `0` for an anonymous PP that is not bound to any tunnel.
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// `l2tp` or `l2tpv3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `lns` or `l2vpn`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_destination_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<L2tpAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_pool: Option<L2tpIpPool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipsec_profile: Option<L2tpIpsec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2tpv3: Option<L2tpv3Config>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<L2tpKeepalive>,
    /// Idle disconnect timer in seconds, `0` when turned off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect_time: Option<u32>,
    pub always_on: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct L2tpAuth {
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpIpPool {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpIpsec {
    pub tunnel_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct L2tpv3Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_router_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_router_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_end_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_auth: Option<L2tpTunnelAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpTunnelAuth {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpKeepalive {
    pub interval: u32,
    pub retry: u32,
}

/// Global `l2tp service` switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpService {
    pub enabled: bool,
    pub protocols: Vec<String>,
}

struct Patterns {
    encapsulation: Regex,
    endpoint_address: Regex,
    endpoint_name: Regex,
    ipsec_tunnel: Regex,
    pre_shared_key: Regex,
    local_router_id: Regex,
    remote_router_id: Regex,
    remote_end_id: Regex,
    always_on: Regex,
    hostname: Regex,
    tunnel_auth: Regex,
    keepalive: Regex,
    disconnect_time: Regex,
    description: Regex,
    enable: Regex,
    bind: Regex,
    auth_accept: Regex,
    auth_myname: Regex,
    pool: Regex,
    service: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("static regex must compile");
    Patterns {
        encapsulation: re(r"^tunnel\s+encapsulation\s+(\S+)$"),
        endpoint_address: re(r"^tunnel\s+endpoint\s+(?:remote\s+)?address\s+(?:(\S+)\s+)?(\S+)$"),
        endpoint_name: re(r"^tunnel\s+endpoint\s+(?:remote\s+)?name\s+(\S+)(?:\s+(fqdn|ip))?$"),
        ipsec_tunnel: re(r"^ipsec\s+tunnel\s+(\d+)$"),
        pre_shared_key: re(r"^ipsec\s+ike\s+pre-shared-key\s+\d+\s+text\s+(.+)$"),
        local_router_id: re(r"^l2tp\s+local\s+router-id\s+(\S+)$"),
        remote_router_id: re(r"^l2tp\s+remote\s+router-id\s+(\S+)$"),
        remote_end_id: re(r"^l2tp\s+remote\s+end-id\s+(\S+)$"),
        always_on: re(r"^l2tp\s+always-on\s+(on|off)$"),
        hostname: re(r"^l2tp\s+hostname\s+(\S+)$"),
        tunnel_auth: re(r"^l2tp\s+tunnel\s+auth\s+(on|off)(?:\s+(\S+))?$"),
        keepalive: re(r"^l2tp\s+keepalive\s+use\s+(on|off)(?:\s+(\d+)\s+(\d+))?$"),
        disconnect_time: re(r"^l2tp\s+tunnel\s+disconnect\s+time\s+(off|\d+)$"),
        description: re(r"^description\s+(?:tunnel\s+)?(.+)$"),
        enable: re(r"^tunnel\s+(enable|disable)\s+(\S+)$"),
        bind: re(r"^pp\s+bind\s+(.+)$"),
        auth_accept: re(r"^pp\s+auth\s+(?:accept|request)\s+(.+)$"),
        auth_myname: re(r"^pp\s+auth\s+myname\s+(\S+)\s+(\S+)$"),
        pool: re(r"^ip\s+pp\s+remote\s+address\s+pool\s+([0-9.]+)-([0-9.]+)$"),
        service: re(r"^l2tp\s+service\s+(on|off)(\s+.+)?$"),
    }
});

/// Build correlated L2TP tunnel records.
///
/// A tunnel is reported when its block uses L2TP encapsulation or `l2tp`
/// commands, or when the anonymous PP binds it. An anonymous PP without any
/// `pp bind tunnel` becomes record `0`.
pub fn extract(stream: &CommandStream) -> Vec<L2tpTunnel> {
    let (tunnels, l2tp_ids) = scan_tunnels(stream);
    let (candidate, bound) = scan_anonymous_pp(stream);

    let mut ids: BTreeSet<u32> = l2tp_ids;
    if candidate.is_some() {
        if bound.is_empty() {
            ids.insert(0);
        } else {
            ids.extend(bound.iter().copied());
        }
    }

    let records: Vec<L2tpTunnel> = ids
        .into_iter()
        .map(|id| {
            let pp = candidate
                .as_ref()
                .filter(|_| bound.contains(&id) || (id == 0 && bound.is_empty()));
            merge::merge(id, tunnels.get(&id), pp)
        })
        .collect();

    debug!(count = records.len(), "extracted l2tp tunnels");
    records
}

/// Read the `l2tp service` switch. The last occurrence wins.
pub fn extract_service(stream: &CommandStream) -> Option<L2tpService> {
    stream
        .global_commands()
        .filter_map(|cmd| PATTERNS.service.captures(cmd.text()))
        .last()
        .map(|caps| {
            let enabled = on_off(&caps[1]);
            let protocols = if enabled {
                caps.get(2)
                    .map_or("", |m| m.as_str())
                    .split_whitespace()
                    .filter(|p| matches!(*p, "l2tp" | "l2tpv3"))
                    .map(str::to_string)
                    .collect()
            } else {
                Vec::new()
            };
            L2tpService { enabled, protocols }
        })
}

/// Tunnel-side partials for every tunnel, plus the ids that use L2TP.
fn scan_tunnels(stream: &CommandStream) -> (BTreeMap<u32, Partial>, BTreeSet<u32>) {
    let p = &*PATTERNS;
    let mut tunnels: BTreeMap<u32, Partial> = BTreeMap::new();
    let mut psk: BTreeMap<u32, String> = BTreeMap::new();
    let mut l2tp_ids = BTreeSet::new();
    let mut switches: Vec<(String, bool)> = Vec::new();

    for cmd in stream.commands() {
        let text = cmd.text();

        if let Some(caps) = p.enable.captures(text) {
            switches.push((caps[2].to_string(), &caps[1] == "enable"));
            continue;
        }

        let Some(id) = stream.enclosing(cmd, ScopeKind::Tunnel).and_then(ScopeKey::id) else {
            continue;
        };
        let t = tunnels.entry(id).or_default();

        if text.starts_with("l2tp ") {
            l2tp_ids.insert(id);
        }

        if let Some(caps) = p.encapsulation.captures(text) {
            match &caps[1] {
                "l2tpv3" => {
                    t.version = Some("l2tpv3".to_string());
                    t.mode = Some("l2vpn".to_string());
                    l2tp_ids.insert(id);
                }
                "l2tp" => {
                    t.version = Some("l2tp".to_string());
                    l2tp_ids.insert(id);
                }
                _ => {}
            }
        } else if let Some(caps) = p.endpoint_address.captures(text) {
            t.tunnel_source = caps.get(1).map(|m| m.as_str().to_string());
            t.tunnel_destination = Some(caps[2].to_string());
            t.tunnel_destination_type = Some("ip".to_string());
        } else if let Some(caps) = p.endpoint_name.captures(text) {
            t.tunnel_destination = Some(caps[1].to_string());
            t.tunnel_destination_type =
                Some(caps.get(2).map_or("fqdn", |m| m.as_str()).to_string());
        } else if let Some(caps) = p.ipsec_tunnel.captures(text) {
            if let Some(ipsec_id) = number(&caps[1]) {
                t.ipsec_profile = Some(L2tpIpsec {
                    tunnel_id: ipsec_id,
                    pre_shared_key: None,
                });
            }
        } else if let Some(caps) = p.pre_shared_key.captures(text) {
            psk.insert(id, caps[1].to_string());
        } else if let Some(caps) = p.local_router_id.captures(text) {
            t.l2tpv3.get_or_insert_with(Default::default).local_router_id = Some(caps[1].to_string());
        } else if let Some(caps) = p.remote_router_id.captures(text) {
            t.l2tpv3.get_or_insert_with(Default::default).remote_router_id = Some(caps[1].to_string());
        } else if let Some(caps) = p.remote_end_id.captures(text) {
            t.l2tpv3.get_or_insert_with(Default::default).remote_end_id = Some(caps[1].to_string());
        } else if let Some(caps) = p.tunnel_auth.captures(text) {
            t.l2tpv3.get_or_insert_with(Default::default).tunnel_auth = Some(L2tpTunnelAuth {
                enabled: on_off(&caps[1]),
                password: caps.get(2).map(|m| m.as_str().to_string()),
            });
        } else if let Some(caps) = p.always_on.captures(text) {
            t.always_on = Some(on_off(&caps[1]));
        } else if let Some(caps) = p.hostname.captures(text) {
            t.hostname = Some(caps[1].to_string());
        } else if let Some(caps) = p.keepalive.captures(text) {
            t.keepalive = match (on_off(&caps[1]), caps.get(2), caps.get(3)) {
                (true, Some(interval), Some(retry)) => {
                    match (number(interval.as_str()), number(retry.as_str())) {
                        (Some(interval), Some(retry)) => Some(L2tpKeepalive { interval, retry }),
                        _ => None,
                    }
                }
                _ => None,
            };
        } else if let Some(caps) = p.disconnect_time.captures(text) {
            t.disconnect_time = if &caps[1] == "off" { Some(0) } else { number(&caps[1]) };
        } else if let Some(caps) = p.description.captures(text) {
            t.name = Some(caps[1].trim().to_string());
        }
    }

    for (id, key) in psk {
        if let Some(profile) = tunnels.get_mut(&id).and_then(|t| t.ipsec_profile.as_mut()) {
            profile.pre_shared_key = Some(key);
        }
    }

    for (target, enabled) in switches {
        if target == "all" {
            for t in tunnels.values_mut() {
                t.enabled = Some(enabled);
            }
        } else if let Some(id) = number::<u32>(&target) {
            tunnels.entry(id).or_default().enabled = Some(enabled);
        }
    }

    (tunnels, l2tp_ids)
}

/// The anonymous PP's contribution and the tunnel ids it binds.
fn scan_anonymous_pp(stream: &CommandStream) -> (Option<Partial>, BTreeSet<u32>) {
    let p = &*PATTERNS;
    let key = ScopeKey::anonymous_pp();
    let mut bound = BTreeSet::new();
    let mut candidate: Option<Partial> = None;

    for cmd in stream.commands_in(&key) {
        let text = cmd.text();
        let c = candidate.get_or_insert_with(|| Partial {
            version: Some("l2tp".to_string()),
            mode: Some("lns".to_string()),
            ..Partial::default()
        });

        if let Some(caps) = p.bind.captures(text) {
            bound.extend(parse_bind_targets(&caps[1]));
        } else if let Some(caps) = p.auth_accept.captures(text) {
            let auth = c.authentication.get_or_insert_with(L2tpAuth::default);
            auth.methods = caps[1].split_whitespace().map(str::to_string).collect();
        } else if let Some(caps) = p.auth_myname.captures(text) {
            let auth = c.authentication.get_or_insert_with(L2tpAuth::default);
            auth.username = Some(caps[1].to_string());
            auth.password = Some(caps[2].to_string());
        } else if let Some(caps) = p.pool.captures(text) {
            c.ip_pool = Some(L2tpIpPool {
                start: caps[1].to_string(),
                end: caps[2].to_string(),
            });
        }
    }

    if let Some(c) = candidate.as_mut() {
        c.enabled = extract_service(stream).map(|service| service.enabled);
    }

    (candidate, bound)
}

/// Largest tunnel interface number on any RTX model.
pub const MAX_TUNNEL_ID: u32 = 3000;

/// Tunnel ids named by `pp bind`: `tunnel1`, `tunnel1-tunnel4`, and lists of both.
///
/// Ranges reaching past [`MAX_TUNNEL_ID`] are dropped whole.
pub fn parse_bind_targets(spec: &str) -> Vec<u32> {
    let mut ids = Vec::new();
    for token in spec.split_whitespace() {
        let (start, end) = match token.split_once('-') {
            Some((start, end)) => (start, end),
            None => (token, token),
        };
        let (Some(start), Some(end)) = (tunnel_number(start), tunnel_number(end)) else {
            continue;
        };
        if end > MAX_TUNNEL_ID {
            warn!(token, max = MAX_TUNNEL_ID, "pp bind target out of range");
            continue;
        }
        if start <= end {
            ids.extend(start..=end);
        }
    }
    ids
}

fn tunnel_number(token: &str) -> Option<u32> {
    token.strip_prefix("tunnel").and_then(number)
}

inventory::submit! {
    Extractor {
        name: "l2tp_tunnels",
        summary: "L2TP tunnels merged from tunnel and anonymous PP blocks",
        run: |stream| to_json("l2tp_tunnels", &extract(stream)),
    }
}

inventory::submit! {
    Extractor {
        name: "l2tp_service",
        summary: "Global L2TP service switch",
        run: |stream| to_json("l2tp_service", &extract_service(stream)),
    }
}
