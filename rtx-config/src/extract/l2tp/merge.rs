use std::fmt::Debug;

use tracing::warn;

use super::{L2tpAuth, L2tpIpPool, L2tpIpsec, L2tpKeepalive, L2tpTunnel, L2tpv3Config};

/// Scope a tunnel field was observed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// `tunnel select N` block, nested IPsec block included.
    Tunnel,
    /// `pp select anonymous` block bound to the tunnel.
    Pp,
}

/// Per-field precedence applied when both scopes describe a field.
///
/// The winner's value is used when present; otherwise the other side fills in.
/// Values are never overwritten once a side has supplied them, and the choice
/// depends only on this table, so scan order cannot change the result.
pub const PRECEDENCE: &[(&str, Source)] = &[
    ("name", Source::Tunnel),
    ("hostname", Source::Tunnel),
    ("version", Source::Tunnel),
    ("mode", Source::Tunnel),
    ("enabled", Source::Tunnel),
    ("tunnel_source", Source::Tunnel),
    ("tunnel_destination", Source::Tunnel),
    ("tunnel_destination_type", Source::Tunnel),
    ("authentication", Source::Pp),
    ("ip_pool", Source::Pp),
    ("ipsec_profile", Source::Tunnel),
    ("l2tpv3", Source::Tunnel),
    ("keepalive", Source::Tunnel),
    ("disconnect_time", Source::Tunnel),
    ("always_on", Source::Tunnel),
];

/// Winning side for a field. Fields missing from the table favour the tunnel.
pub fn winner(field: &str) -> Source {
    PRECEDENCE
        .iter()
        .find(|(name, _)| *name == field)
        .map_or(Source::Tunnel, |(_, source)| *source)
}

/// Field values contributed by one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partial {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub mode: Option<String>,
    pub enabled: Option<bool>,
    pub tunnel_source: Option<String>,
    pub tunnel_destination: Option<String>,
    pub tunnel_destination_type: Option<String>,
    pub authentication: Option<L2tpAuth>,
    pub ip_pool: Option<L2tpIpPool>,
    pub ipsec_profile: Option<L2tpIpsec>,
    pub l2tpv3: Option<L2tpv3Config>,
    pub keepalive: Option<L2tpKeepalive>,
    pub disconnect_time: Option<u32>,
    pub always_on: Option<bool>,
}

/// Combine the tunnel-side and PP-side views of tunnel `id`.
pub fn merge(id: u32, tunnel: Option<&Partial>, pp: Option<&Partial>) -> L2tpTunnel {
    let empty = Partial::default();
    let t = tunnel.unwrap_or(&empty);
    let p = pp.unwrap_or(&empty);

    L2tpTunnel {
        id,
        name: pick(id, "name", &t.name, &p.name),
        hostname: pick(id, "hostname", &t.hostname, &p.hostname),
        version: pick(id, "version", &t.version, &p.version),
        mode: pick(id, "mode", &t.mode, &p.mode),
        enabled: pick(id, "enabled", &t.enabled, &p.enabled).unwrap_or(false),
        tunnel_source: pick(id, "tunnel_source", &t.tunnel_source, &p.tunnel_source),
        tunnel_destination: pick(id, "tunnel_destination", &t.tunnel_destination, &p.tunnel_destination),
        tunnel_destination_type: pick(
            id,
            "tunnel_destination_type",
            &t.tunnel_destination_type,
            &p.tunnel_destination_type,
        ),
        authentication: pick(id, "authentication", &t.authentication, &p.authentication),
        ip_pool: pick(id, "ip_pool", &t.ip_pool, &p.ip_pool),
        ipsec_profile: pick(id, "ipsec_profile", &t.ipsec_profile, &p.ipsec_profile),
        l2tpv3: pick(id, "l2tpv3", &t.l2tpv3, &p.l2tpv3),
        keepalive: pick(id, "keepalive", &t.keepalive, &p.keepalive),
        disconnect_time: pick(id, "disconnect_time", &t.disconnect_time, &p.disconnect_time),
        always_on: pick(id, "always_on", &t.always_on, &p.always_on).unwrap_or(false),
    }
}

fn pick<T: Clone + PartialEq + Debug>(
    id: u32,
    field: &str,
    tunnel: &Option<T>,
    pp: &Option<T>,
) -> Option<T> {
    let (first, second) = match winner(field) {
        Source::Tunnel => (tunnel, pp),
        Source::Pp => (pp, tunnel),
    };
    if let (Some(a), Some(b)) = (first, second) {
        if a != b {
            warn!(tunnel = id, field, kept = ?a, ignored = ?b, "l2tp scopes disagree");
        }
    }
    first.clone().or_else(|| second.clone())
}
