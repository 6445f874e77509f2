//! Configuration loader
//!
//! Loads [`WorkbridgeSettings`] from a file and environment variables.
//!
//! ## Loading Strategy
//! 1. `WORKBRIDGE_CONFIG` names the file; otherwise standard paths are probed
//! 2. No file means built-in defaults
//! 3. Environment variables override whatever the file says
//! 4. JSON and TOML are supported, detected by extension
//!
//! ## Environment Variables
//! - `WORKBRIDGE_CONFIG`: Config file path
//! - `WORKBRIDGE_CLIENT_ID`: Entra public client id
//! - `WORKBRIDGE_AUTHORITY_URL`: Identity platform authority
//! - `WORKBRIDGE_TOKEN_EXPIRY_MARGIN_SECS`: Near-expiry margin in seconds
//! - `WORKBRIDGE_KEYCHAIN_SERVICE`: Keychain service name
//! - `WORKBRIDGE_LOG_LEVEL`: Log filter directive
//! - `WORKBRIDGE_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader probes (in order) `workbridge.{json,toml}` and
//! `config.{json,toml}` in the working directory, its two parents, and next to
//! the executable.

use std::path::{Path, PathBuf};

use workbridge_domain::{ConnectionError, Result, WorkbridgeSettings};

pub const ENV_CONFIG_PATH: &str = "WORKBRIDGE_CONFIG";
pub const ENV_CLIENT_ID: &str = "WORKBRIDGE_CLIENT_ID";
pub const ENV_AUTHORITY_URL: &str = "WORKBRIDGE_AUTHORITY_URL";
pub const ENV_TOKEN_EXPIRY_MARGIN_SECS: &str = "WORKBRIDGE_TOKEN_EXPIRY_MARGIN_SECS";
pub const ENV_KEYCHAIN_SERVICE: &str = "WORKBRIDGE_KEYCHAIN_SERVICE";
pub const ENV_LOG_LEVEL: &str = "WORKBRIDGE_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "WORKBRIDGE_LOG_JSON";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["workbridge.json", "workbridge.toml", "config.json", "config.toml"];

/// Load settings: file (explicit or probed) or defaults, then environment
/// overrides.
///
/// # Errors
/// Returns `ConnectionError::Config` if the file cannot be read or parsed, or
/// an environment override has an invalid value.
pub fn load() -> Result<WorkbridgeSettings> {
    let explicit = std::env::var(ENV_CONFIG_PATH).ok().filter(|p| !p.trim().is_empty());
    let base = match explicit {
        Some(path) => load_from_file(Some(PathBuf::from(path)))?,
        None => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::debug!("no config file found; using defaults");
                WorkbridgeSettings::default()
            }
        },
    };
    apply_overrides(base, |key| std::env::var(key).ok())
}

/// Defaults with environment overrides applied.
///
/// # Errors
/// Returns `ConnectionError::Config` for invalid override values.
pub fn load_from_env() -> Result<WorkbridgeSettings> {
    apply_overrides(WorkbridgeSettings::default(), |key| std::env::var(key).ok())
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `ConnectionError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<WorkbridgeSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConnectionError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConnectionError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ConnectionError::Config(format!("Failed to read config file: {e}")))?;

    parse_settings(&contents, &config_path)
}

/// Parse settings, format chosen by extension (`.json` default, `.toml`).
fn parse_settings(contents: &str, path: &Path) -> Result<WorkbridgeSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConnectionError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConnectionError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ConnectionError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Apply `WORKBRIDGE_*` overrides read through `lookup`.
fn apply_overrides<F>(mut settings: WorkbridgeSettings, lookup: F) -> Result<WorkbridgeSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(client_id) = value(ENV_CLIENT_ID) {
        settings.auth.client_id = client_id;
    }
    if let Some(authority) = value(ENV_AUTHORITY_URL) {
        settings.auth.authority_url = authority;
    }
    if let Some(margin) = value(ENV_TOKEN_EXPIRY_MARGIN_SECS) {
        settings.auth.token_expiry_margin_secs = margin.parse::<u64>().map_err(|e| {
            ConnectionError::Config(format!("Invalid {ENV_TOKEN_EXPIRY_MARGIN_SECS}: {e}"))
        })?;
    }
    if let Some(service) = value(ENV_KEYCHAIN_SERVICE) {
        settings.secrets.keychain_service = service;
    }
    if let Some(level) = value(ENV_LOG_LEVEL) {
        settings.logging.level = level;
    }
    if let Some(json) = value(ENV_LOG_JSON) {
        settings.logging.json = parse_bool(&json);
    }

    Ok(settings)
}

/// Accepts `1`/`true`/`yes`/`on` (case-insensitive); anything else is false.
fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::Builder;
    use workbridge_domain::AuthMethod;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for truthy in ["1", "true", "TRUE", "yes", "On"] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["0", "false", "no", "off", "maybe"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let settings = apply_overrides(
            WorkbridgeSettings::default(),
            lookup(&[
                (ENV_CLIENT_ID, "custom-client"),
                (ENV_TOKEN_EXPIRY_MARGIN_SECS, "120"),
                (ENV_LOG_JSON, "true"),
                (ENV_LOG_LEVEL, "  "),
            ]),
        )
        .unwrap();

        assert_eq!(settings.auth.client_id, "custom-client");
        assert_eq!(settings.auth.token_expiry_margin_secs, 120);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn invalid_numeric_override_is_a_config_error() {
        let result = apply_overrides(
            WorkbridgeSettings::default(),
            lookup(&[(ENV_TOKEN_EXPIRY_MARGIN_SECS, "five minutes")]),
        );
        assert!(matches!(result, Err(ConnectionError::Config(msg)) if msg.contains(ENV_TOKEN_EXPIRY_MARGIN_SECS)));
    }

    #[test]
    fn parses_toml_with_connections() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[[connections]]
id = "c1"
organization = "contoso"
project = "Fabric"
authMethod = "entra"

[auth]
token_expiry_margin_secs = 60
"#
        )
        .unwrap();

        let settings = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.connections.len(), 1);
        assert_eq!(settings.connections[0].auth_method, AuthMethod::Entra);
        assert_eq!(settings.auth.token_expiry_margin_secs, 60);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConnectionError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn missing_explicit_file_is_reported() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/workbridge.json")));
        assert!(matches!(result, Err(ConnectionError::Config(msg)) if msg.contains("not found")));
    }
}
