use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::{CommandStream, ScopeKey, ScopeKind};
use serde::Serialize;

use super::number;
use crate::registry::{to_json, Extractor};

/// Every secret the configuration carries in clear or hashed form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrator_password: Option<String>,
    /// One entry per account, sorted by name.
    pub users: Vec<UserCredential>,
    pub ipsec_pre_shared_keys: Vec<IpsecPreSharedKey>,
    pub l2tp_tunnel_auth: Vec<L2tpTunnelSecret>,
    pub pp_auth: Vec<PpCredential>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCredential {
    pub username: String,
    /// Clear text, or the device hash when `encrypted` is set.
    pub password: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpsecPreSharedKey {
    pub gateway_id: u32,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2tpTunnelSecret {
    /// Enclosing `tunnel select`, absent when the command sat at top level.
    pub tunnel_id: Option<u32>,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PpCredential {
    pub pp: String,
    pub username: String,
    pub password: String,
}

struct Patterns {
    login_password: Regex,
    admin_password: Regex,
    user_encrypted: Regex,
    user_plain: Regex,
    ipsec_psk: Regex,
    l2tp_auth: Regex,
    pp_username: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    login_password: Regex::new(r"^login\s+password\s+(.+)$").expect("static regex must compile"),
    admin_password: Regex::new(r"^administrator\s+password\s+(.+)$")
        .expect("static regex must compile"),
    user_encrypted: Regex::new(r"^login\s+user\s+(\S+)\s+encrypted\s+(\S+)$")
        .expect("static regex must compile"),
    user_plain: Regex::new(r"^login\s+user\s+(\S+)\s+(.+)$").expect("static regex must compile"),
    ipsec_psk: Regex::new(r"^ipsec\s+ike\s+pre-shared-key\s+(\d+)\s+text\s+(.+)$")
        .expect("static regex must compile"),
    l2tp_auth: Regex::new(r"^l2tp\s+tunnel\s+auth\s+on\s+(\S+)$").expect("static regex must compile"),
    pp_username: Regex::new(r"^pp\s+auth\s+username\s+(\S+)\s+(.+)$")
        .expect("static regex must compile"),
});

/// Gather passwords and shared secrets from every scope.
pub fn extract(stream: &CommandStream) -> Credentials {
    let p = &*PATTERNS;
    let mut out = Credentials::default();
    let mut users: BTreeMap<String, UserCredential> = BTreeMap::new();

    for cmd in stream.global_commands() {
        let text = cmd.text();
        if let Some(caps) = p.login_password.captures(text) {
            out.login_password = Some(caps[1].to_string());
        } else if let Some(caps) = p.admin_password.captures(text) {
            out.administrator_password = Some(caps[1].to_string());
        } else if let Some(caps) = p.user_encrypted.captures(text) {
            users.insert(
                caps[1].to_string(),
                UserCredential {
                    username: caps[1].to_string(),
                    password: caps[2].to_string(),
                    encrypted: true,
                },
            );
        } else if let Some(caps) = p.user_plain.captures(text) {
            // A later line for the same account replaces the earlier one.
            users.insert(
                caps[1].to_string(),
                UserCredential {
                    username: caps[1].to_string(),
                    password: caps[2].to_string(),
                    encrypted: false,
                },
            );
        }
    }
    out.users = users.into_values().collect();

    for cmd in stream.commands() {
        let text = cmd.text();
        if let Some(caps) = p.ipsec_psk.captures(text) {
            let Some(gateway_id) = number(&caps[1]) else { continue };
            out.ipsec_pre_shared_keys.push(IpsecPreSharedKey {
                gateway_id,
                secret: caps[2].to_string(),
            });
        } else if let Some(caps) = p.l2tp_auth.captures(text) {
            out.l2tp_tunnel_auth.push(L2tpTunnelSecret {
                tunnel_id: stream.enclosing(cmd, ScopeKind::Tunnel).and_then(ScopeKey::id),
                secret: caps[1].to_string(),
            });
        }
    }

    for cmd in stream.commands_in_kind(ScopeKind::Pp) {
        let Some(caps) = p.pp_username.captures(cmd.text()) else {
            continue;
        };
        out.pp_auth.push(PpCredential {
            pp: stream.key_of(cmd).to_string(),
            username: caps[1].to_string(),
            password: caps[2].to_string(),
        });
    }

    out
}

inventory::submit! {
    Extractor {
        name: "credentials",
        summary: "Passwords, pre-shared keys and PP accounts",
        run: |stream| to_json("credentials", &extract(stream)),
    }
}
