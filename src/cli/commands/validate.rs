//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Caduceus configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        match config.validate() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Configuration Summary:");
                println!("  Environment: {:?}", config.application.environment);
                println!("  Log Level: {}", config.application.log_level);
                println!(
                    "  Sender: {}^{}",
                    config.engine.sending_application, config.engine.sending_facility
                );
                println!(
                    "  Processing ID: {} (HL7 {})",
                    config.engine.processing_id, config.engine.version_id
                );
                println!("  Dispatch Timeout: {}ms", config.engine.dispatch_timeout_ms);
                if config.listener.enabled {
                    println!(
                        "  Listener: {} ({}, max {} connections)",
                        config.listener.bind_address,
                        config.listener.framing,
                        config.listener.max_connections
                    );
                } else {
                    println!("  Listener: disabled");
                }
                for partner in &config.partners {
                    let auth = if partner.auth_token.is_some() { ", bearer token" } else { "" };
                    println!(
                        "  Partner {}: {} ({}, PID {:?}{auth})",
                        partner.name, partner.endpoint, partner.framing, partner.pid_layout
                    );
                }
                if config.audit.enabled {
                    println!("  Audit Log: {}", config.audit.log_path);
                }
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2) // Configuration error exit code
            }
        }
    }
}
