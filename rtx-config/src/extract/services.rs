use std::sync::LazyLock;

use regex::Regex;
use rtx_config_core::CommandStream;
use serde::Serialize;

use super::on_off;
use crate::registry::{to_json, Extractor};

/// Management daemons. Each is absent when none of its commands appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Services {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub httpd: Option<Httpd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sshd: Option<Sshd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sftpd: Option<Sftpd>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Httpd {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub proxy_access: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sshd {
    pub enabled: bool,
    pub hosts: Vec<String>,
    /// `password`, `publickey`, or `any` when unrestricted.
    pub auth_method: String,
}

impl Default for Sshd {
    fn default() -> Self {
        Self {
            enabled: false,
            hosts: Vec::new(),
            auth_method: "any".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sftpd {
    pub hosts: Vec<String>,
}

struct Patterns {
    httpd_host: Regex,
    httpd_proxy: Regex,
    sshd_service: Regex,
    sshd_key: Regex,
    sshd_host: Regex,
    sshd_auth: Regex,
    sftpd_host: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("static regex must compile");
    Patterns {
        httpd_host: re(r"^httpd\s+host\s+(\S+)$"),
        httpd_proxy: re(r"^httpd\s+proxy-access\s+l2ms\s+permit\s+(on|off)$"),
        sshd_service: re(r"^sshd\s+service\s+(on|off)$"),
        sshd_key: re(r"^sshd\s+host\s+key\s+"),
        sshd_host: re(r"^sshd\s+host\s+(.+)$"),
        sshd_auth: re(r"^sshd\s+auth\s+method\s+(password|publickey)$"),
        sftpd_host: re(r"^sftpd\s+host\s+(.+)$"),
    }
});

/// Read httpd, sshd and sftpd settings from the global scope.
///
/// Host key material (`sshd host key ...`) is skipped.
pub fn extract(stream: &CommandStream) -> Services {
    let p = &*PATTERNS;
    let mut out = Services::default();

    for cmd in stream.global_commands() {
        let text = cmd.text();
        if let Some(caps) = p.httpd_host.captures(text) {
            out.httpd.get_or_insert_with(Httpd::default).host = Some(caps[1].to_string());
        } else if let Some(caps) = p.httpd_proxy.captures(text) {
            out.httpd.get_or_insert_with(Httpd::default).proxy_access = on_off(&caps[1]);
        } else if let Some(caps) = p.sshd_service.captures(text) {
            out.sshd.get_or_insert_with(Sshd::default).enabled = on_off(&caps[1]);
        } else if p.sshd_key.is_match(text) {
            continue;
        } else if let Some(caps) = p.sshd_host.captures(text) {
            out.sshd.get_or_insert_with(Sshd::default).hosts = words(&caps[1]);
        } else if let Some(caps) = p.sshd_auth.captures(text) {
            out.sshd.get_or_insert_with(Sshd::default).auth_method = caps[1].to_string();
        } else if let Some(caps) = p.sftpd_host.captures(text) {
            out.sftpd.get_or_insert_with(Sftpd::default).hosts = words(&caps[1]);
        }
    }

    out
}

fn words(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_string).collect()
}

inventory::submit! {
    Extractor {
        name: "services",
        summary: "httpd, sshd and sftpd settings",
        run: |stream| to_json("services", &extract(stream)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rtx_config_core::parse;

    use super::{extract, Httpd, Services, Sftpd, Sshd};

    #[test]
    fn daemons_and_host_lists() {
        let raw = "httpd host lan1\n\
                   httpd proxy-access l2ms permit on\n\
                   sshd service on\n\
                   sshd host lan1 lan2\n\
                   sshd host key generate *\n\
                   sshd auth method publickey\n\
                   sftpd host lan1";
        assert_eq!(
            extract(&parse(raw)),
            Services {
                httpd: Some(Httpd {
                    host: Some("lan1".to_string()),
                    proxy_access: true,
                }),
                sshd: Some(Sshd {
                    enabled: true,
                    hosts: vec!["lan1".to_string(), "lan2".to_string()],
                    auth_method: "publickey".to_string(),
                }),
                sftpd: Some(Sftpd {
                    hosts: vec!["lan1".to_string()],
                }),
            }
        );
    }

    #[test]
    fn key_lines_alone_do_not_create_sshd() {
        let services = extract(&parse("sshd host key generate *"));
        assert_eq!(services, Services::default());
    }
}
