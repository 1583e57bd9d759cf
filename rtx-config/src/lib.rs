//! Yamaha RTX router configuration extraction.
//!
//! Builds on `rtx-config-core`, which turns raw configuration text into a
//! scope-tagged command stream, and adds the router-specific pieces:
//!
//! - [`extract`]: typed resource extractors (routes, DHCP, NAT, filters,
//!   credentials, L2TP, IPsec, DNS, management services) and the cross-scope
//!   merge rules they need
//! - [`registry`]: extractor catalogue used to list and run extractors by name
//! - [`settings`]: TOML settings with embedded defaults
//! - [`inspect`]: command stream slices and scope summaries
//! - [`report`]: terminal-friendly colored output
//!
//! # Examples
//!
//! ```ignore
//! use rtx_config::extract::extract_all;
//! use rtx_config_core::parse_file;
//!
//! let stream = parse_file("rtx1210.conf".as_ref())?;
//! let inventory = extract_all(&stream)?;
//! for tunnel in &inventory.l2tp_tunnels {
//!     println!("tunnel {} enabled={}", tunnel.id, tunnel.enabled);
//! }
//! ```

pub mod extract;
pub mod inspect;
pub mod registry;
pub mod report;
pub mod settings;
