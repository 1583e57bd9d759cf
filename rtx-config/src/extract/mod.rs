//! Typed resource extraction over a scope-tagged command stream.
//!
//! Every extractor is a free function `extract(&CommandStream)` that reads the
//! stream without mutating it and returns records ordered by their natural key.
//! Extractors never see raw text, only commands and the scopes they were read in.

pub mod credentials;
pub mod dhcp;
pub mod dhcp_bindings;
pub mod dns;
pub mod ip_filter;
pub mod ipsec_tunnel;
pub mod l2tp;
pub mod nat;
pub mod net;
pub mod services;
pub mod static_routes;

use rtx_config_core::CommandStream;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use credentials::Credentials;
pub use dhcp::DhcpScope;
pub use dhcp_bindings::DhcpBinding;
pub use dns::{DnsConfig, DnsServerSelect};
pub use ip_filter::{IpFilter, IpFilterDynamic, IpFilterSet};
pub use ipsec_tunnel::IpsecTunnel;
pub use l2tp::{L2tpService, L2tpTunnel};
pub use nat::NatMasquerade;
pub use services::Services;
pub use static_routes::StaticRoute;

/// Errors raised when a command carries a token that cannot be interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("line {line}: invalid MAC address `{value}`")]
    InvalidMac { line: usize, value: String },
    #[error("line {line}: invalid address range `{value}`")]
    InvalidRange { line: usize, value: String },
    #[error("line {line}: invalid prefix length or netmask `{value}`")]
    InvalidPrefix { line: usize, value: String },
    #[error("line {line}: invalid IPv4 address `{value}`")]
    InvalidAddress { line: usize, value: String },
    #[error("failed to serialize {section}: {message}")]
    Serialize { section: &'static str, message: String },
}

impl ExtractError {
    /// Source line the offending token was read from.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::InvalidMac { line, .. }
            | Self::InvalidRange { line, .. }
            | Self::InvalidPrefix { line, .. }
            | Self::InvalidAddress { line, .. } => Some(*line),
            Self::Serialize { .. } => None,
        }
    }
}

/// Every typed collection the extractors produce for one configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigInventory {
    pub static_routes: Vec<StaticRoute>,
    pub dhcp_scopes: Vec<DhcpScope>,
    pub dhcp_bindings: Vec<DhcpBinding>,
    pub nat_masquerade: Vec<NatMasquerade>,
    pub ip_filters: IpFilterSet,
    pub credentials: Credentials,
    pub l2tp_tunnels: Vec<L2tpTunnel>,
    pub l2tp_service: Option<L2tpService>,
    pub ipsec_tunnels: Vec<IpsecTunnel>,
    pub dns: Option<DnsConfig>,
    pub services: Services,
}

/// Run every extractor against the stream.
pub fn extract_all(stream: &CommandStream) -> Result<ConfigInventory, ExtractError> {
    let inventory = ConfigInventory {
        static_routes: static_routes::extract(stream)?,
        dhcp_scopes: dhcp::extract(stream)?,
        dhcp_bindings: dhcp_bindings::extract(stream)?,
        nat_masquerade: nat::extract(stream),
        ip_filters: ip_filter::extract(stream),
        credentials: credentials::extract(stream),
        l2tp_tunnels: l2tp::extract(stream),
        l2tp_service: l2tp::extract_service(stream),
        ipsec_tunnels: ipsec_tunnel::extract(stream),
        dns: dns::extract(stream),
        services: services::extract(stream),
    };

    debug!(
        routes = inventory.static_routes.len(),
        dhcp_scopes = inventory.dhcp_scopes.len(),
        l2tp_tunnels = inventory.l2tp_tunnels.len(),
        ipsec_tunnels = inventory.ipsec_tunnels.len(),
        "extracted configuration inventory"
    );
    Ok(inventory)
}

/// Parse an integer capture, treating overflow as "not this command".
pub(crate) fn number<T: std::str::FromStr>(text: &str) -> Option<T> {
    text.parse().ok()
}

/// Device on/off switch.
pub(crate) fn on_off(text: &str) -> bool {
    text == "on"
}
