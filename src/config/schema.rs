//! Configuration schema types
//!
//! This module defines the configuration structure that maps to `caduceus.toml`.

use crate::adapters::transport::Framing;
use crate::config::SecretString;
use crate::core::builder::BuildOptions;
use crate::core::decoder::PidLayout;
use crate::domain::Hl7Result;
use crate::hl7::EncodingChars;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main Caduceus configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaduceusConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Header values and dispatch limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Inbound listener
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Outbound partners
    #[serde(default)]
    pub partners: Vec<PartnerConfig>,

    /// Audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CaduceusConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.engine.validate()?;
        self.listener.validate()?;

        let mut names = HashSet::new();
        for partner in &self.partners {
            partner.validate(&self.application.environment)?;
            if !names.insert(partner.name.as_str()) {
                return Err(format!("Duplicate partner name '{}'", partner.name));
            }
        }

        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Partner by name
    pub fn partner(&self, name: &str) -> Option<&PartnerConfig> {
        self.partners.iter().find(|p| p.name == name)
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            environment: Environment::default(),
        }
    }
}

/// Engine settings shared by inbound and outbound traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// MSH-3 of outbound messages
    #[serde(default = "default_sending_application")]
    pub sending_application: String,

    /// MSH-4 of outbound messages
    #[serde(default = "default_sending_facility")]
    pub sending_facility: String,

    /// MSH-11 (P production, D debugging, T training)
    #[serde(default = "default_processing_id")]
    pub processing_id: String,

    /// MSH-12
    #[serde(default = "default_version_id")]
    pub version_id: String,

    /// Deadline for one dispatch, in milliseconds
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sending_application.trim().is_empty() {
            return Err("engine.sending_application cannot be empty".to_string());
        }

        let valid_processing_ids = ["P", "D", "T"];
        if !valid_processing_ids.contains(&self.processing_id.as_str()) {
            return Err(format!(
                "Invalid engine.processing_id '{}'. Must be one of: {}",
                self.processing_id,
                valid_processing_ids.join(", ")
            ));
        }

        if self.version_id.trim().is_empty() {
            return Err("engine.version_id cannot be empty".to_string());
        }

        if !(1..=300_000).contains(&self.dispatch_timeout_ms) {
            return Err(format!(
                "engine.dispatch_timeout_ms must be between 1 and 300000, got {}",
                self.dispatch_timeout_ms
            ));
        }
        Ok(())
    }

    pub fn dispatch_deadline(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Builder options for a partner, using its encoding characters
    pub fn build_options(&self, partner: &PartnerConfig) -> Hl7Result<BuildOptions> {
        Ok(BuildOptions {
            encoding: partner.encoding()?,
            processing_id: self.processing_id.clone(),
            version_id: self.version_id.clone(),
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sending_application: default_sending_application(),
            sending_facility: default_sending_facility(),
            processing_id: default_processing_id(),
            version_id: default_version_id(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

/// Inbound listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Socket address to bind, e.g. `0.0.0.0:2575`
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub framing: Framing,

    /// Concurrent connections served
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Idle time before a connection is closed
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,
}

impl ListenerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "listener.bind_address '{}' is not a valid socket address",
                self.bind_address
            ));
        }
        if self.max_connections == 0 || self.max_connections > 10_000 {
            return Err(format!(
                "listener.max_connections must be between 1 and 10000, got {}",
                self.max_connections
            ));
        }
        if self.read_timeout_seconds == 0 {
            return Err("listener.read_timeout_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            framing: Framing::default(),
            max_connections: default_max_connections(),
            read_timeout_seconds: default_read_timeout_seconds(),
        }
    }
}

/// An outbound integration partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    pub name: String,

    /// `tcp://host:port` or `http(s)://...`
    pub endpoint: String,

    /// Envelope for TCP endpoints
    #[serde(default)]
    pub framing: Framing,

    /// MSH-5 of messages sent to this partner
    #[serde(default)]
    pub receiving_application: String,

    /// MSH-6 of messages sent to this partner
    #[serde(default)]
    pub receiving_facility: String,

    /// MSH-1 followed by MSH-2
    #[serde(default = "default_encoding_characters")]
    pub encoding_characters: String,

    /// Where this partner places PID fields
    #[serde(default)]
    pub pid_layout: PidLayout,

    /// Bearer token for HTTP endpoints
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub auth_token: Option<SecretString>,

    /// Connect and reply timeout
    #[serde(default = "default_partner_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl PartnerConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("partners.name cannot be empty".to_string());
        }

        let endpoint = self.endpoint.as_str();
        let valid_scheme = ["tcp://", "mllp://", "http://", "https://"]
            .iter()
            .any(|scheme| endpoint.starts_with(scheme));
        if !valid_scheme {
            return Err(format!(
                "partner '{}': endpoint must start with tcp://, mllp://, http:// or https://",
                self.name
            ));
        }

        // Security: partner traffic carries PHI
        if *environment == Environment::Production && endpoint.starts_with("http://") {
            return Err(format!(
                "partner '{}': HTTP endpoints must use https:// in production environments",
                self.name
            ));
        }

        self.encoding()
            .map_err(|e| format!("partner '{}': {e}", self.name))?;

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(format!(
                "partner '{}': timeout_seconds must be between 1 and 600, got {}",
                self.name, self.timeout_seconds
            ));
        }
        Ok(())
    }

    pub fn is_http(&self) -> bool {
        self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")
    }

    /// Declared encoding characters
    pub fn encoding(&self) -> Hl7Result<EncodingChars> {
        EncodingChars::parse(&self.encoding_characters)
    }
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: String::new(),
            framing: Framing::default(),
            receiving_application: String::new(),
            receiving_facility: String::new(),
            encoding_characters: default_encoding_characters(),
            pid_layout: PidLayout::default(),
            auth_token: None,
            timeout_seconds: default_partner_timeout_seconds(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Write entries to `log_path`; when disabled entries go to the log stream
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_audit_log_path")]
    pub log_path: String,

    /// JSON lines instead of plain text
    #[serde(default = "default_true")]
    pub json_format: bool,
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.log_path.trim().is_empty() {
            return Err("audit.log_path cannot be empty when audit is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
            json_format: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sending_application() -> String {
    "CADUCEUS".to_string()
}

fn default_sending_facility() -> String {
    "HOSPITAL".to_string()
}

fn default_processing_id() -> String {
    "P".to_string()
}

fn default_version_id() -> String {
    "2.5".to_string()
}

fn default_dispatch_timeout_ms() -> u64 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0:2575".to_string()
}

fn default_max_connections() -> usize {
    64
}

fn default_read_timeout_seconds() -> u64 {
    300
}

fn default_encoding_characters() -> String {
    "|^~\\&".to_string()
}

fn default_partner_timeout_seconds() -> u64 {
    30
}

fn default_audit_log_path() -> String {
    "./audit/caduceus-audit.log".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}
