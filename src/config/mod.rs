//! Configuration management for Caduceus.
//!
//! TOML configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CADUCEUS_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use caduceus::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("caduceus.toml")?;
//!
//! println!("Listening on {}", config.listener.bind_address);
//! for partner in &config.partners {
//!     println!("{} -> {}", partner.name, partner.endpoint);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//! environment = "production"
//!
//! [engine]
//! sending_application = "CADUCEUS"
//! sending_facility = "GENERAL"
//!
//! [listener]
//! enabled = true
//! bind_address = "0.0.0.0:2575"
//!
//! [[partners]]
//! name = "lab"
//! endpoint = "tcp://lab.example.org:2575"
//! receiving_application = "LIS"
//! receiving_facility = "LAB"
//!
//! [[partners]]
//! name = "radiology"
//! endpoint = "https://ris.example.org/hl7"
//! auth_token = "${CADUCEUS_RIS_TOKEN}"
//! pid_layout = "shifted"
//! ```
//!
//! Per-partner settings are handed to the codec and transport explicitly as a
//! [`PartnerConfig`]; nothing here is global.

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, AuditConfig, CaduceusConfig, EngineConfig, Environment, ListenerConfig,
    LoggingConfig, PartnerConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
