//! IPsec tunnels, correlated across three key spaces.
//!
//! `tunnel select N` names the tunnel and holds `ipsec tunnel P`. The SA policy
//! is keyed by `P` and names the security gateway `G`; IKE settings are keyed
//! by `G`. Policies and IKE lines are accepted from any scope, since flat
//! configurations often list them after the tunnel block.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::{CommandStream, ScopeKey, ScopeKind};
use serde::Serialize;
use tracing::debug;

use super::ip_filter::{parse_secure, SecureFilter};
use super::{number, on_off};
use crate::registry::{to_json, Extractor};

pub const DEFAULT_DPD_INTERVAL: u32 = 30;
pub const DEFAULT_IKE_LIFETIME: u32 = 28800;
pub const DEFAULT_SA_LIFETIME: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpsecTunnel {
    /// `tunnel select` id.
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Id from the nested `ipsec tunnel` line, which is also the SA policy id.
    pub ipsec_id: u32,
    pub gateway_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
    pub ike: IkeProposal,
    pub transform: IpsecTransform,
    pub keepalive: IkeKeepalive,
    pub nat_traversal: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secure_filters: Vec<SecureFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_mss_limit: Option<String>,
    pub enabled: bool,
}

/// Phase 1 parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IkeProposal {
    pub encryption: Vec<String>,
    pub hash: Vec<String>,
    pub group: Vec<String>,
    pub lifetime_seconds: u32,
}

/// Phase 2 parameters from `ipsec sa policy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpsecTransform {
    pub protocol: String,
    pub algorithms: Vec<String>,
    pub lifetime_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IkeKeepalive {
    pub enabled: bool,
    pub mode: KeepaliveMode,
    pub interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
}

impl Default for IkeKeepalive {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: KeepaliveMode::Dpd,
            interval: DEFAULT_DPD_INTERVAL,
            retry: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepaliveMode {
    Dpd,
    Heartbeat,
}

struct Patterns {
    ipsec_tunnel: Regex,
    sa_policy: Regex,
    ike: Regex,
    keepalive: Regex,
    duration: Regex,
    description: Regex,
    secure: Regex,
    tcp_mss: Regex,
    enable: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("static regex must compile");
    Patterns {
        ipsec_tunnel: re(r"^ipsec\s+tunnel\s+(\d+)$"),
        sa_policy: re(r"^ipsec\s+sa\s+policy\s+(\d+)\s+(\d+)\s+(\w+)\s+(.+)$"),
        ike: re(
            r"^ipsec\s+ike\s+(local\s+address|remote\s+address|pre-shared-key|encryption|hash|group|nat-traversal)\s+(\d+)\s+(.+)$",
        ),
        keepalive: re(
            r"^ipsec\s+ike\s+keepalive\s+use\s+(\d+)\s+(on|off)(?:\s+(dpd|heartbeat)(?:\s+(\d+))?(?:\s+(\d+))?)?$",
        ),
        duration: re(r"^ipsec\s+ike\s+duration\s+(isakmp-sa|ipsec-sa)\s+(\d+)\s+(\d+)"),
        description: re(r"^description\s+(?:tunnel\s+)?(.+)$"),
        secure: re(r"^ip\s+tunnel\s+secure\s+filter\s+(in|out)\s+(.+)$"),
        tcp_mss: re(r"^ip\s+tunnel\s+tcp\s+mss\s+limit\s+(\S+)$"),
        enable: re(r"^tunnel\s+(enable|disable)\s+(\S+)$"),
    }
});

/// Tunnel-scoped facts, keyed by `tunnel select` id.
#[derive(Debug, Default)]
struct TunnelSide {
    ipsec_id: Option<u32>,
    name: Option<String>,
    secure_filters: Vec<SecureFilter>,
    tcp_mss_limit: Option<String>,
    enabled: Option<bool>,
}

struct Policy {
    gateway: u32,
    protocol: String,
    algorithms: Vec<String>,
}

/// IKE facts, keyed by security gateway id.
#[derive(Debug, Clone, Default)]
struct Gateway {
    local_address: Option<String>,
    remote_address: Option<String>,
    pre_shared_key: Option<String>,
    encryption: Vec<String>,
    hash: Vec<String>,
    group: Vec<String>,
    nat_traversal: bool,
    keepalive: Option<IkeKeepalive>,
    isakmp_lifetime: Option<u32>,
    sa_lifetime: Option<u32>,
}

/// Build one record per tunnel that carries an `ipsec tunnel` line.
pub fn extract(stream: &CommandStream) -> Vec<IpsecTunnel> {
    let p = &*PATTERNS;
    let mut tunnels: BTreeMap<u32, TunnelSide> = BTreeMap::new();
    let mut policies: BTreeMap<u32, Policy> = BTreeMap::new();
    let mut gateways: BTreeMap<u32, Gateway> = BTreeMap::new();
    let mut switches: Vec<(String, bool)> = Vec::new();

    for cmd in stream.commands() {
        let text = cmd.text();

        if let Some(caps) = p.sa_policy.captures(text) {
            let (Some(policy), Some(gateway)) = (number(&caps[1]), number(&caps[2])) else {
                continue;
            };
            policies.insert(
                policy,
                Policy {
                    gateway,
                    protocol: caps[3].to_string(),
                    algorithms: split_list(&caps[4]),
                },
            );
            continue;
        }
        if let Some(caps) = p.ike.captures(text) {
            let Some(gw) = number(&caps[2]) else { continue };
            apply_ike(gateways.entry(gw).or_default(), &caps[1], caps[3].trim());
            continue;
        }
        if let Some(caps) = p.keepalive.captures(text) {
            let Some(gw) = number(&caps[1]) else { continue };
            gateways.entry(gw).or_default().keepalive = Some(parse_keepalive(&caps));
            continue;
        }
        if let Some(caps) = p.duration.captures(text) {
            let (Some(gw), Some(seconds)) = (number(&caps[2]), number(&caps[3])) else {
                continue;
            };
            let gateway = gateways.entry(gw).or_default();
            if &caps[1] == "isakmp-sa" {
                gateway.isakmp_lifetime = Some(seconds);
            } else {
                gateway.sa_lifetime = Some(seconds);
            }
            continue;
        }
        if let Some(caps) = p.enable.captures(text) {
            switches.push((caps[2].to_string(), &caps[1] == "enable"));
            continue;
        }

        let Some(id) = stream.enclosing(cmd, ScopeKind::Tunnel).and_then(ScopeKey::id) else {
            continue;
        };
        let side = tunnels.entry(id).or_default();

        if let Some(caps) = p.ipsec_tunnel.captures(text) {
            side.ipsec_id = number(&caps[1]);
        } else if let Some(caps) = p.description.captures(text) {
            side.name = Some(caps[1].trim().to_string());
        } else if let Some(caps) = p.secure.captures(text) {
            let filter = parse_secure(format!("tunnel {id}"), &caps[1], &caps[2]);
            side.secure_filters.retain(|f| f.direction != filter.direction);
            side.secure_filters.push(filter);
        } else if let Some(caps) = p.tcp_mss.captures(text) {
            side.tcp_mss_limit = Some(caps[1].to_string());
        }
    }

    for (target, enabled) in switches {
        if target == "all" {
            tunnels.values_mut().for_each(|t| t.enabled = Some(enabled));
        } else if let Some(side) = number(&target).and_then(|id: u32| tunnels.get_mut(&id)) {
            side.enabled = Some(enabled);
        }
    }

    let records: Vec<IpsecTunnel> = tunnels
        .into_iter()
        .filter_map(|(id, side)| {
            let ipsec_id = side.ipsec_id?;
            Some(assemble(id, ipsec_id, side, &policies, &gateways))
        })
        .collect();

    debug!(count = records.len(), "extracted ipsec tunnels");
    records
}

fn assemble(
    id: u32,
    ipsec_id: u32,
    side: TunnelSide,
    policies: &BTreeMap<u32, Policy>,
    gateways: &BTreeMap<u32, Gateway>,
) -> IpsecTunnel {
    let policy = policies.get(&ipsec_id);
    let gateway_id = policy.map_or(id, |p| p.gateway);
    let gw = gateways.get(&gateway_id).cloned().unwrap_or_default();

    IpsecTunnel {
        id,
        name: side.name,
        ipsec_id,
        gateway_id,
        local_address: gw.local_address,
        remote_address: gw.remote_address,
        pre_shared_key: gw.pre_shared_key,
        ike: IkeProposal {
            encryption: gw.encryption,
            hash: gw.hash,
            group: gw.group,
            lifetime_seconds: gw.isakmp_lifetime.unwrap_or(DEFAULT_IKE_LIFETIME),
        },
        transform: IpsecTransform {
            protocol: policy.map_or_else(|| "esp".to_string(), |p| p.protocol.clone()),
            algorithms: policy.map(|p| p.algorithms.clone()).unwrap_or_default(),
            lifetime_seconds: gw.sa_lifetime.unwrap_or(DEFAULT_SA_LIFETIME),
        },
        keepalive: gw.keepalive.unwrap_or_default(),
        nat_traversal: gw.nat_traversal,
        secure_filters: side.secure_filters,
        tcp_mss_limit: side.tcp_mss_limit,
        enabled: side.enabled.unwrap_or(false),
    }
}

fn apply_ike(gateway: &mut Gateway, setting: &str, value: &str) {
    match setting.split_whitespace().next().unwrap_or_default() {
        "local" => gateway.local_address = Some(value.to_string()),
        "remote" => gateway.remote_address = Some(value.to_string()),
        "pre-shared-key" => {
            let secret = value.strip_prefix("text").map_or(value, str::trim_start);
            gateway.pre_shared_key = Some(secret.to_string());
        }
        "encryption" => gateway.encryption = split_list(value),
        "hash" => gateway.hash = split_list(value),
        "group" => gateway.group = split_list(value),
        "nat-traversal" => gateway.nat_traversal = value.split_whitespace().next().is_some_and(on_off),
        _ => {}
    }
}

fn parse_keepalive(caps: &regex::Captures<'_>) -> IkeKeepalive {
    let mode = match caps.get(3).map(|m| m.as_str()) {
        Some("heartbeat") => KeepaliveMode::Heartbeat,
        _ => KeepaliveMode::Dpd,
    };
    IkeKeepalive {
        enabled: on_off(&caps[2]),
        mode,
        interval: caps
            .get(4)
            .and_then(|m| number(m.as_str()))
            .unwrap_or(DEFAULT_DPD_INTERVAL),
        retry: caps.get(5).and_then(|m| number(m.as_str())),
    }
}

/// Algorithm lists are written space- or comma-separated.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

inventory::submit! {
    Extractor {
        name: "ipsec_tunnels",
        summary: "IPsec tunnels with SA policy and IKE settings",
        run: |stream| to_json("ipsec_tunnels", &extract(stream)),
    }
}
