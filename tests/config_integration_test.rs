//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use caduceus::adapters::transport::Framing;
use caduceus::config::{load_config, Environment};
use caduceus::core::decoder::PidLayout;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("CADUCEUS_APPLICATION_LOG_LEVEL");
    std::env::remove_var("CADUCEUS_APPLICATION_ENVIRONMENT");
    std::env::remove_var("CADUCEUS_ENGINE_SENDING_FACILITY");
    std::env::remove_var("CADUCEUS_ENGINE_DISPATCH_TIMEOUT_MS");
    std::env::remove_var("CADUCEUS_LISTENER_BIND_ADDRESS");
    std::env::remove_var("CADUCEUS_LISTENER_MAX_CONNECTIONS");
    std::env::remove_var("CADUCEUS_PARTNER_LAB_EAST_ENDPOINT");
    std::env::remove_var("CADUCEUS_PARTNER_LAB_EAST_AUTH_TOKEN");
    std::env::remove_var("TEST_CADUCEUS_LAB_TOKEN");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let file = write_config(
        r#"
[application]
log_level = "debug"
environment = "staging"

[engine]
sending_application = "CADUCEUS"
sending_facility = "GENERAL"
processing_id = "T"
version_id = "2.5.1"
dispatch_timeout_ms = 2500

[listener]
enabled = true
bind_address = "127.0.0.1:2575"
framing = "raw"
max_connections = 16
read_timeout_seconds = 60

[[partners]]
name = "ehr"
endpoint = "tcp://ehr.example.org:2575"
receiving_application = "EHR"
receiving_facility = "WARD"
pid_layout = "shifted"

[[partners]]
name = "lab"
endpoint = "https://lab.example.org/hl7"
receiving_application = "LIS"
receiving_facility = "LAB"
auth_token = "static-token"
timeout_seconds = 10

[audit]
enabled = false
log_path = "/var/log/caduceus/audit.log"
json_format = true

[logging]
local_enabled = false
local_path = "/var/log/caduceus"
local_rotation = "hourly"
local_max_size_mb = 50
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.application.environment, Environment::Staging);

    assert_eq!(config.engine.sending_facility, "GENERAL");
    assert_eq!(config.engine.processing_id, "T");
    assert_eq!(config.engine.dispatch_deadline(), Duration::from_millis(2500));

    assert!(config.listener.enabled);
    assert_eq!(config.listener.framing, Framing::Raw);
    assert_eq!(config.listener.max_connections, 16);

    assert_eq!(config.partners.len(), 2);
    let ehr = config.partner("ehr").unwrap();
    assert_eq!(ehr.pid_layout, PidLayout::Shifted);
    assert_eq!(ehr.framing, Framing::Mllp);
    assert!(!ehr.is_http());

    let lab = config.partner("lab").unwrap();
    assert!(lab.is_http());
    assert_eq!(lab.timeout_seconds, 10);
    assert_eq!(
        lab.auth_token.as_ref().unwrap().expose_secret().to_string(),
        "static-token"
    );

    assert!(!config.audit.enabled);
    assert_eq!(config.logging.local_rotation, "hourly");
    cleanup_env_vars();
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let file = write_config("");

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.application.environment, Environment::Development);
    assert_eq!(config.engine.sending_application, "CADUCEUS");
    assert_eq!(config.engine.sending_facility, "HOSPITAL");
    assert_eq!(config.engine.processing_id, "P");
    assert_eq!(config.engine.version_id, "2.5");
    assert!(!config.listener.enabled);
    assert!(config.partners.is_empty());
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_CADUCEUS_LAB_TOKEN", "substituted-token");

    let file = write_config(
        r#"
[[partners]]
name = "lab"
endpoint = "https://lab.example.org/hl7"
auth_token = "${TEST_CADUCEUS_LAB_TOKEN}"
"#,
    );

    let config = load_config(file.path()).unwrap();
    let token = config.partner("lab").unwrap().auth_token.as_ref().unwrap();
    assert_eq!(token.expose_secret().to_string(), "substituted-token");

    cleanup_env_vars();
}

#[test]
fn test_missing_env_var_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[[partners]]
name = "lab"
endpoint = "https://lab.example.org/hl7"
auth_token = "${TEST_CADUCEUS_LAB_TOKEN}"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_CADUCEUS_LAB_TOKEN"));
}

#[test]
fn test_env_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CADUCEUS_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("CADUCEUS_ENGINE_SENDING_FACILITY", "NORTH");
    std::env::set_var("CADUCEUS_ENGINE_DISPATCH_TIMEOUT_MS", "750");
    std::env::set_var("CADUCEUS_LISTENER_BIND_ADDRESS", "127.0.0.1:3575");
    std::env::set_var("CADUCEUS_PARTNER_LAB_EAST_ENDPOINT", "tcp://10.0.0.5:2575");
    std::env::set_var("CADUCEUS_PARTNER_LAB_EAST_AUTH_TOKEN", "env-token");

    let file = write_config(
        r#"
[engine]
sending_facility = "SOUTH"

[[partners]]
name = "lab-east"
endpoint = "tcp://lab-east.example.org:2575"
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.engine.sending_facility, "NORTH");
    assert_eq!(config.engine.dispatch_timeout_ms, 750);
    assert_eq!(config.listener.bind_address, "127.0.0.1:3575");

    let partner = config.partner("lab-east").unwrap();
    assert_eq!(partner.endpoint, "tcp://10.0.0.5:2575");
    assert_eq!(
        partner.auth_token.as_ref().unwrap().expose_secret().to_string(),
        "env-token"
    );

    cleanup_env_vars();
}

#[test]
fn test_invalid_env_override_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CADUCEUS_LISTENER_MAX_CONNECTIONS", "lots");

    let file = write_config("");
    assert!(load_config(file.path()).is_err());

    cleanup_env_vars();
}

#[test]
fn test_validation_failures() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        ("[application]\nlog_level = \"verbose\"", "log_level"),
        ("[engine]\nprocessing_id = \"X\"", "processing_id"),
        ("[engine]\ndispatch_timeout_ms = 0", "dispatch_timeout_ms"),
        ("[listener]\nbind_address = \"not-an-address\"", "bind_address"),
        ("[listener]\nmax_connections = 0", "max_connections"),
        (
            "[[partners]]\nname = \"lab\"\nendpoint = \"ftp://lab.example.org\"",
            "endpoint",
        ),
        (
            "[[partners]]\nname = \"lab\"\nendpoint = \"tcp://a:1\"\nencoding_characters = \"|^^\\\\&\"",
            "lab",
        ),
        (
            "[[partners]]\nname = \"lab\"\nendpoint = \"tcp://a:1\"\n[[partners]]\nname = \"lab\"\nendpoint = \"tcp://b:1\"",
            "Duplicate",
        ),
    ];

    for (contents, expected) in cases {
        let file = write_config(contents);
        let err = load_config(file.path()).unwrap_err().to_string();
        assert!(err.contains(expected), "{contents:?} gave {err}");
    }
}

#[test]
fn test_production_requires_https_partners() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
environment = "production"

[[partners]]
name = "lab"
endpoint = "http://lab.example.org/hl7"
"#,
    );
    let err = load_config(file.path()).unwrap_err().to_string();
    assert!(err.contains("https://"));

    // the same partner is fine outside production
    std::env::set_var("CADUCEUS_APPLICATION_ENVIRONMENT", "development");
    assert!(load_config(file.path()).is_ok());

    cleanup_env_vars();
}

#[test]
fn test_load_config_missing_file() {
    let err = load_config("/nonexistent/caduceus.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_partner_build_options_use_declared_encoding() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r##"
[[partners]]
name = "legacy"
endpoint = "tcp://legacy.example.org:2575"
encoding_characters = "#*+!@"
"##,
    );
    let config = load_config(file.path()).unwrap();
    let options = config
        .engine
        .build_options(config.partner("legacy").unwrap())
        .unwrap();

    assert_eq!(options.encoding.field, '#');
    assert_eq!(options.encoding.component, '*');
    assert_eq!(options.processing_id, "P");
}
