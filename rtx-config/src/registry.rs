//! Extractor catalogue.
//!
//! Each extractor module registers itself with `inventory::submit!`; the CLI
//! lists and selects extractors by name through this module without knowing
//! the concrete record types.

use rtx_config_core::CommandStream;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::extract::ExtractError;

/// Runs one extractor and returns its records as JSON.
pub type RunFn = fn(&CommandStream) -> Result<Value, ExtractError>;

pub struct Extractor {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: RunFn,
}

inventory::collect!(Extractor);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown extractor `{name}` (known: {})", .known.join(", "))]
pub struct UnknownExtractor {
    pub name: String,
    pub known: Vec<&'static str>,
}

/// Every registered extractor, ordered by name.
pub fn all() -> Vec<&'static Extractor> {
    let mut extractors: Vec<&'static Extractor> = inventory::iter::<Extractor>.into_iter().collect();
    extractors.sort_by_key(|e| e.name);
    extractors
}

pub fn names() -> Vec<&'static str> {
    all().into_iter().map(|e| e.name).collect()
}

pub fn find(name: &str) -> Option<&'static Extractor> {
    inventory::iter::<Extractor>
        .into_iter()
        .find(|e| e.name == name)
}

/// Look up extractors by name, keeping the requested order and dropping repeats.
/// An empty request selects every extractor.
pub fn resolve(requested: &[String]) -> Result<Vec<&'static Extractor>, UnknownExtractor> {
    if requested.is_empty() {
        return Ok(all());
    }
    let mut selected: Vec<&'static Extractor> = Vec::new();
    for name in requested {
        let extractor = find(name).ok_or_else(|| UnknownExtractor {
            name: name.clone(),
            known: names(),
        })?;
        if !selected.iter().any(|e| e.name == extractor.name) {
            selected.push(extractor);
        }
    }
    Ok(selected)
}

/// Serialize extractor output for the catalogue.
pub(crate) fn to_json<T: Serialize>(section: &'static str, records: &T) -> Result<Value, ExtractError> {
    serde_json::to_value(records).map_err(|err| ExtractError::Serialize {
        section,
        message: err.to_string(),
    })
}

/// `null`, or containers holding nothing but empty values.
pub fn is_empty_output(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().all(is_empty_output),
        Value::Object(fields) => fields.values().all(is_empty_output),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use rtx_config_core::parse;
    use serde_json::json;

    use super::{all, find, is_empty_output, names, resolve};

    const SECTIONS: [&str; 11] = [
        "credentials",
        "dhcp_bindings",
        "dhcp_scopes",
        "dns",
        "ip_filters",
        "ipsec_tunnels",
        "l2tp_service",
        "l2tp_tunnels",
        "nat_masquerade",
        "services",
        "static_routes",
    ];

    #[test]
    fn every_section_is_registered_once() {
        assert_eq!(names(), SECTIONS.to_vec());
        assert!(all().iter().all(|e| !e.summary.is_empty()));
    }

    #[test]
    fn empty_input_gives_empty_output_everywhere() {
        let stream = parse("");
        for extractor in all() {
            let value = (extractor.run)(&stream).expect("empty input never fails");
            assert!(is_empty_output(&value), "{} produced {value}", extractor.name);
        }
    }

    #[test]
    fn resolve_keeps_order_and_rejects_unknown_names() {
        let picked = resolve(&["dns".to_string(), "static_routes".to_string(), "dns".to_string()])
            .expect("known names");
        let picked: Vec<_> = picked.iter().map(|e| e.name).collect();
        assert_eq!(picked, vec!["dns", "static_routes"]);

        let err = resolve(&["bgp".to_string()]).err().expect("unknown name");
        assert_eq!(err.name, "bgp");
        assert!(err.to_string().contains("static_routes"));

        assert_eq!(resolve(&[]).expect("all").len(), SECTIONS.len());
    }

    #[test]
    fn run_by_name() {
        let stream = parse("ip route default gateway 192.168.1.254");
        let routes = (find("static_routes").expect("registered").run)(&stream).expect("routes");
        assert_eq!(routes[0]["prefix"], "0.0.0.0");
    }

    #[test]
    fn emptiness_is_recursive() {
        assert!(is_empty_output(&json!({"users": [], "pp_auth": []})));
        assert!(is_empty_output(&json!(null)));
        assert!(!is_empty_output(&json!({"enabled": false})));
        assert!(!is_empty_output(&json!([{"id": 1}])));
    }
}
