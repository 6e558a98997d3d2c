//! Status command implementation
//!
//! This module implements the `status` command for displaying engine
//! health and the message types it handles.

use super::{engine_registry, load_or_default};
use crate::core::status::StatusTracker;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking engine status");

        let tracker = StatusTracker::start();
        let registry = engine_registry();
        let status = tracker.status(&registry);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(0);
        }

        println!("📊 Engine Status");
        println!();
        println!("  State: {}", status.state);
        println!("  Version: {}", status.version);
        println!("  Supported Message Types:");
        for key in &status.supported_message_types {
            println!("    - {key}");
        }

        match load_or_default(config_path) {
            Ok(config) => {
                println!();
                if config.listener.enabled {
                    println!(
                        "  Listener: {} ({})",
                        config.listener.bind_address, config.listener.framing
                    );
                } else {
                    println!("  Listener: disabled");
                }
                println!("  Partners: {}", config.partners.len());
                for partner in &config.partners {
                    println!("    - {} -> {}", partner.name, partner.endpoint);
                }
            }
            Err(e) => {
                println!();
                println!("⚠️  Configuration could not be loaded: {e}");
            }
        }

        println!();
        Ok(0)
    }
}
