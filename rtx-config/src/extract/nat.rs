use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::CommandStream;
use serde::Serialize;

use super::number;
use crate::registry::{to_json, Extractor};

/// NAT descriptor running in masquerade (NAPT) mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatMasquerade {
    pub descriptor_id: u32,
    /// `primary`, `ipcp`, an interface name or an address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_network: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_entries: Vec<MasqueradeStatic>,
}

/// Port forwarding entry, ordered by `entry_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasqueradeStatic {
    pub entry_number: u32,
    pub inside_local: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inside_local_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outside_global: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outside_global_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

struct Patterns {
    kind: Regex,
    outer: Regex,
    inner: Regex,
    mapped: Regex,
    forward: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    kind: Regex::new(r"^nat\s+descriptor\s+type\s+(\d+)\s+(\S+)$").expect("static regex must compile"),
    outer: Regex::new(r"^nat\s+descriptor\s+address\s+outer\s+(\d+)\s+(\S+)$")
        .expect("static regex must compile"),
    inner: Regex::new(r"^nat\s+descriptor\s+address\s+inner\s+(\d+)\s+(\S+)$")
        .expect("static regex must compile"),
    mapped: Regex::new(
        r"^nat\s+descriptor\s+masquerade\s+static\s+(\d+)\s+(\d+)\s+([^\s:]+):(\S+)=([^\s:]+):(\S+)(?:\s+(\S+))?$",
    )
    .expect("static regex must compile"),
    forward: Regex::new(
        r"^nat\s+descriptor\s+masquerade\s+static\s+(\d+)\s+(\d+)\s+(\S+)\s+(\S+)(?:\s+(\S+))?$",
    )
    .expect("static regex must compile"),
});

#[derive(Debug, Default)]
struct Descriptor {
    masquerade: bool,
    outer: Option<String>,
    inner: Option<String>,
    statics: BTreeMap<u32, MasqueradeStatic>,
}

/// Collect masquerade descriptors. Descriptors typed as something other than
/// `masquerade` and without static masquerade entries are left out.
pub fn extract(stream: &CommandStream) -> Vec<NatMasquerade> {
    let p = &*PATTERNS;
    let mut descriptors: BTreeMap<u32, Descriptor> = BTreeMap::new();

    for cmd in stream.global_commands() {
        let text = cmd.text();

        if let Some(caps) = p.kind.captures(text) {
            if let Some(id) = number(&caps[1]) {
                descriptors.entry(id).or_default().masquerade = &caps[2] == "masquerade";
            }
        } else if let Some(caps) = p.outer.captures(text) {
            if let Some(id) = number(&caps[1]) {
                descriptors.entry(id).or_default().outer = Some(caps[2].to_string());
            }
        } else if let Some(caps) = p.inner.captures(text) {
            if let Some(id) = number(&caps[1]) {
                descriptors.entry(id).or_default().inner = Some(caps[2].to_string());
            }
        } else if let Some(caps) = p.mapped.captures(text) {
            let (Some(id), Some(entry)) = (number(&caps[1]), number(&caps[2])) else {
                continue;
            };
            let item = MasqueradeStatic {
                entry_number: entry,
                outside_global: Some(caps[3].to_string()),
                outside_global_port: Some(caps[4].to_string()),
                inside_local: caps[5].to_string(),
                inside_local_port: Some(caps[6].to_string()),
                protocol: caps.get(7).map(|m| m.as_str().to_string()),
            };
            descriptors.entry(id).or_default().statics.insert(entry, item);
        } else if let Some(caps) = p.forward.captures(text) {
            let (Some(id), Some(entry)) = (number(&caps[1]), number(&caps[2])) else {
                continue;
            };
            // `<inner> <proto> [outer=inner | port]`
            let (outside_port, inside_port) = match caps.get(5).map(|m| m.as_str()) {
                Some(ports) => match ports.split_once('=') {
                    Some((outer, inner)) => (Some(outer.to_string()), Some(inner.to_string())),
                    None => (Some(ports.to_string()), Some(ports.to_string())),
                },
                None => (None, None),
            };
            let item = MasqueradeStatic {
                entry_number: entry,
                inside_local: caps[3].to_string(),
                inside_local_port: inside_port,
                outside_global: None,
                outside_global_port: outside_port,
                protocol: Some(caps[4].to_string()),
            };
            descriptors.entry(id).or_default().statics.insert(entry, item);
        }
    }

    descriptors
        .into_iter()
        .filter(|(_, d)| d.masquerade || !d.statics.is_empty())
        .map(|(descriptor_id, d)| NatMasquerade {
            descriptor_id,
            outer_address: d.outer,
            inner_network: d.inner,
            static_entries: d.statics.into_values().collect(),
        })
        .collect()
}

inventory::submit! {
    Extractor {
        name: "nat_masquerade",
        summary: "Masquerade NAT descriptors and port forwards",
        run: |stream| to_json("nat_masquerade", &extract(stream)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rtx_config_core::parse;

    use super::{extract, MasqueradeStatic};

    #[test]
    fn masquerade_with_device_style_forwards() {
        let raw = "nat descriptor type 1000 masquerade\n\
                   nat descriptor address outer 1000 primary\n\
                   nat descriptor address inner 1000 auto\n\
                   nat descriptor masquerade static 1000 3 192.168.1.1 esp\n\
                   nat descriptor masquerade static 1000 1 192.168.1.1 udp 500\n\
                   nat descriptor masquerade static 1000 2 192.168.1.10 tcp 8080=80";
        let nat = extract(&parse(raw));

        assert_eq!(nat.len(), 1);
        assert_eq!(nat[0].descriptor_id, 1000);
        assert_eq!(nat[0].outer_address.as_deref(), Some("primary"));
        assert_eq!(nat[0].inner_network.as_deref(), Some("auto"));
        let numbers: Vec<_> = nat[0].static_entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(nat[0].static_entries[1].outside_global_port.as_deref(), Some("8080"));
        assert_eq!(nat[0].static_entries[1].inside_local_port.as_deref(), Some("80"));
        assert_eq!(nat[0].static_entries[2].protocol.as_deref(), Some("esp"));
        assert_eq!(nat[0].static_entries[2].inside_local_port, None);
    }

    #[test]
    fn mapped_form_keeps_both_sides() {
        let nat = extract(&parse(
            "nat descriptor type 1 masquerade\nnat descriptor masquerade static 1 1 203.0.113.1:80=192.168.1.100:8080 tcp",
        ));
        assert_eq!(
            nat[0].static_entries,
            vec![MasqueradeStatic {
                entry_number: 1,
                inside_local: "192.168.1.100".to_string(),
                inside_local_port: Some("8080".to_string()),
                outside_global: Some("203.0.113.1".to_string()),
                outside_global_port: Some("80".to_string()),
                protocol: Some("tcp".to_string()),
            }]
        );
    }

    #[test]
    fn plain_nat_descriptors_are_skipped() {
        let raw = "nat descriptor type 2 nat\nnat descriptor address outer 2 203.0.113.5";
        assert!(extract(&parse(raw)).is_empty());
    }
}
