use std::fs;
use std::path::Path;

use rtx_config_core::ParseOptions;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Tool settings read from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub parser: ParseOptions,
    pub extract: ExtractSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractSettings {
    /// Extractors run when none are named on the command line. Empty runs all.
    pub sections: Vec<String>,
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsLoadError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

const EMBEDDED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/settings/default.toml"));

/// Load settings from a TOML file. Missing keys take their defaults.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_settings(&raw, path.display().to_string())
}

/// Settings shipped with the binary.
pub fn default_settings() -> Settings {
    match parse_settings(EMBEDDED, "embedded settings".to_string()) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(%err, "embedded settings are invalid; using built-in defaults");
            Settings::default()
        }
    }
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsLoadError> {
    toml::from_str(raw).map_err(|source| SettingsLoadError::Parse { path, source })
}
