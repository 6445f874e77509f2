//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading settings from files.

use std::io::Write;

use tempfile::Builder;
use workbridge_domain::constants::{AZURE_DEVOPS_PUBLIC_CLIENT_ID, DEFAULT_AUTHORITY_URL};
use workbridge_domain::AuthMethod;
use workbridge_infra::config;

#[test]
fn test_load_settings_from_json_file() {
    let json_content = r#"{
        "connections": [
            {
                "id": "c1",
                "organization": "contoso",
                "project": "Fabric",
                "authMethod": "entra",
                "tenantId": "organizations"
            },
            { "id": "c2", "organization": "contoso", "project": "Ops" }
        ],
        "auth": { "scopes": ["custom/.default"], "token_expiry_margin_secs": 120 },
        "secrets": { "keychain_service": "Workbridge.integration" },
        "logging": { "level": "debug", "json": true }
    }"#;

    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("Failed to create temp file");
    temp_file.write_all(json_content.as_bytes()).expect("Failed to write to temp file");

    let settings = config::load_from_file(Some(temp_file.path().to_path_buf()))
        .expect("Failed to load settings from JSON file");

    assert_eq!(settings.connections.len(), 2);
    assert_eq!(settings.connections[0].auth_method, AuthMethod::Entra);
    assert_eq!(settings.connections[0].configured_tenant(), None);
    assert_eq!(settings.connections[1].auth_method, AuthMethod::Pat);

    assert_eq!(settings.auth.scopes, vec!["custom/.default".to_string()]);
    assert_eq!(settings.auth.token_expiry_margin_secs, 120);
    assert_eq!(settings.auth.client_id, AZURE_DEVOPS_PUBLIC_CLIENT_ID);
    assert_eq!(settings.auth.authority_url, DEFAULT_AUTHORITY_URL);

    assert_eq!(settings.secrets.keychain_service, "Workbridge.integration");
    assert_eq!(settings.logging.level, "debug");
    assert!(settings.logging.json);
}

#[test]
fn test_load_settings_from_toml_file() {
    let toml_content = r#"
[discovery]
tenant_info_base_url = "https://vssps.example.test"
request_timeout_secs = 3

[logging]
level = "workbridge_core=trace"
"#;

    let mut temp_file = Builder::new().suffix(".toml").tempfile().expect("Failed to create temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");

    let settings = config::load_from_file(Some(temp_file.path().to_path_buf()))
        .expect("Failed to load settings from TOML file");

    assert!(settings.connections.is_empty());
    assert_eq!(settings.discovery.tenant_info_base_url, "https://vssps.example.test");
    assert_eq!(settings.discovery.request_timeout_secs, 3);
    assert_eq!(settings.logging.level, "workbridge_core=trace");
    assert!(!settings.logging.json);
}

#[test]
fn test_invalid_json_is_a_config_error() {
    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("Failed to create temp file");
    temp_file.write_all(b"{ \"auth\": ").expect("Failed to write to temp file");

    let err = config::load_from_file(Some(temp_file.path().to_path_buf())).unwrap_err();
    assert!(err.to_string().contains("Invalid JSON format"), "{err}");
}

#[test]
fn test_wrongly_typed_field_is_rejected() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().expect("Failed to create temp file");
    temp_file
        .write_all(b"[auth]\ntoken_expiry_margin_secs = \"soon\"\n")
        .expect("Failed to write to temp file");

    let err = config::load_from_file(Some(temp_file.path().to_path_buf())).unwrap_err();
    assert!(err.to_string().contains("Invalid TOML format"), "{err}");
}

#[test]
fn test_missing_explicit_file_is_reported() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let missing = dir.path().join("absent.toml");

    let err = config::load_from_file(Some(missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"), "{err}");
}
