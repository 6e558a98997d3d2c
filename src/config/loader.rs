//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CaduceusConfig, Environment};
use super::secret::secret_string;
use crate::domain::errors::CaduceusError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CaduceusConfig
/// 4. Applies environment variable overrides (CADUCEUS_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`CaduceusError::Configuration`] if the file cannot be read, a
/// referenced variable is unset, the TOML is invalid or validation fails.
///
/// # Examples
///
/// ```no_run
/// use caduceus::config::loader::load_config;
///
/// let config = load_config("caduceus.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CaduceusConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CaduceusError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CaduceusError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Same as [`load_config`] for configuration text already in memory
pub fn parse_config(contents: &str) -> Result<CaduceusConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CaduceusConfig = toml::from_str(&contents)
        .map_err(|e| CaduceusError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        CaduceusError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched. Every missing variable is reported in
/// one error.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CaduceusError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CaduceusError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.trim().parse().map(Some).map_err(|_| {
            CaduceusError::Configuration(format!("Invalid value '{val}' for {name}"))
        }),
        Err(_) => Ok(None),
    }
}

fn parse_environment(value: &str) -> Result<Environment> {
    match value.to_lowercase().as_str() {
        "development" => Ok(Environment::Development),
        "staging" => Ok(Environment::Staging),
        "production" => Ok(Environment::Production),
        _ => Err(CaduceusError::Configuration(format!(
            "Invalid CADUCEUS_APPLICATION_ENVIRONMENT '{value}'. Must be one of: development, staging, production"
        ))),
    }
}

/// Applies environment variable overrides using CADUCEUS_* prefix
///
/// Environment variables follow the pattern: CADUCEUS_<SECTION>_<KEY>
/// For example: CADUCEUS_LISTENER_BIND_ADDRESS, CADUCEUS_ENGINE_PROCESSING_ID.
/// Partners are overridden by name: CADUCEUS_PARTNER_<NAME>_ENDPOINT and
/// CADUCEUS_PARTNER_<NAME>_AUTH_TOKEN, with the name uppercased and `-`
/// replaced by `_`.
fn apply_env_overrides(config: &mut CaduceusConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("CADUCEUS_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_APPLICATION_ENVIRONMENT") {
        config.application.environment = parse_environment(&val)?;
    }

    // Engine overrides
    if let Ok(val) = std::env::var("CADUCEUS_ENGINE_SENDING_APPLICATION") {
        config.engine.sending_application = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_ENGINE_SENDING_FACILITY") {
        config.engine.sending_facility = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_ENGINE_PROCESSING_ID") {
        config.engine.processing_id = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_ENGINE_VERSION_ID") {
        config.engine.version_id = val;
    }
    if let Some(ms) = env_parsed("CADUCEUS_ENGINE_DISPATCH_TIMEOUT_MS")? {
        config.engine.dispatch_timeout_ms = ms;
    }

    // Listener overrides
    if let Some(enabled) = env_parsed("CADUCEUS_LISTENER_ENABLED")? {
        config.listener.enabled = enabled;
    }
    if let Ok(val) = std::env::var("CADUCEUS_LISTENER_BIND_ADDRESS") {
        config.listener.bind_address = val;
    }
    if let Some(framing) = env_parsed("CADUCEUS_LISTENER_FRAMING")? {
        config.listener.framing = framing;
    }
    if let Some(max) = env_parsed("CADUCEUS_LISTENER_MAX_CONNECTIONS")? {
        config.listener.max_connections = max;
    }
    if let Some(seconds) = env_parsed("CADUCEUS_LISTENER_READ_TIMEOUT_SECONDS")? {
        config.listener.read_timeout_seconds = seconds;
    }

    // Partner overrides
    for partner in &mut config.partners {
        let prefix = format!(
            "CADUCEUS_PARTNER_{}",
            partner.name.to_uppercase().replace('-', "_")
        );
        if let Ok(val) = std::env::var(format!("{prefix}_ENDPOINT")) {
            partner.endpoint = val;
        }
        if let Ok(val) = std::env::var(format!("{prefix}_AUTH_TOKEN")) {
            partner.auth_token = Some(secret_string(val));
        }
    }

    // Audit overrides
    if let Some(enabled) = env_parsed("CADUCEUS_AUDIT_ENABLED")? {
        config.audit.enabled = enabled;
    }
    if let Ok(val) = std::env::var("CADUCEUS_AUDIT_LOG_PATH") {
        config.audit.log_path = val;
    }
    if let Some(json) = env_parsed("CADUCEUS_AUDIT_JSON_FORMAT")? {
        config.audit.json_format = json;
    }

    // Logging overrides
    if let Some(enabled) = env_parsed("CADUCEUS_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("CADUCEUS_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
