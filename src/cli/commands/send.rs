//! Send command implementation
//!
//! This module implements the `send` command: a structured event read from
//! JSON is built into a message and delivered to one configured partner.

use crate::adapters::audit::sink_from_config;
use crate::config::{load_config, EngineConfig, PartnerConfig};
use crate::core::builder::MessageBuilder;
use crate::core::client::OutboundClient;
use crate::core::events::StructuredEvent;
use crate::domain::CaduceusError;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the send command
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Partner name from the `[[partners]]` section
    #[arg(short, long)]
    pub partner: String,

    /// Structured event JSON file
    #[arg(short, long)]
    pub event: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SendArgs {
    /// Execute the send command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(partner = %self.partner, "Starting send command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let Some(partner) = config.partner(&self.partner) else {
            println!("❌ Unknown partner: {}", self.partner);
            return Ok(2); // Configuration error exit code
        };

        let contents = match std::fs::read_to_string(&self.event) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to read {}", self.event.display());
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };
        let mut event: StructuredEvent = match serde_json::from_str(&contents) {
            Ok(event) => event,
            Err(e) => {
                println!("❌ {} is not a valid event", self.event.display());
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };
        fill_routing(&mut event, &config.engine, partner);

        let audit = match sink_from_config(&config.audit) {
            Ok(sink) => sink,
            Err(e) => {
                println!("❌ Failed to open audit log");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let client = match OutboundClient::for_partner(
            &config.engine,
            partner,
            &MessageBuilder::standard(),
            audit,
        ) {
            Ok(client) => client,
            Err(e) => {
                println!("❌ Partner '{}' is misconfigured", partner.name);
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        println!("📤 Sending {} to {}", event.key(), client.endpoint());

        match client.send_event(&event).await {
            Ok(report) => {
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("   Control ID: {}", report.control_id);
                    match report.ack_code {
                        Some(code) => println!("   Acknowledgment: {code}"),
                        None => println!("   Acknowledgment: none"),
                    }
                    if let Some(text) = &report.ack_text {
                        println!("   Detail: {text}");
                    }
                }

                if report.is_accepted() {
                    println!("✅ Message accepted");
                    Ok(0)
                } else {
                    println!("⚠️  Message not accepted by partner");
                    Ok(1) // Negative acknowledgment exit code
                }
            }
            Err(CaduceusError::Transport(e)) => {
                println!("❌ Failed to deliver message");
                println!("   Error: {e}");
                Ok(4) // Connection error exit code
            }
            Err(e) => {
                println!("❌ Send failed");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }
}

/// Header values the event left empty come from the engine and partner
fn fill_routing(event: &mut StructuredEvent, engine: &EngineConfig, partner: &PartnerConfig) {
    let routing = &mut event.routing;
    let fill = |value: &mut String, default: &str| {
        if value.trim().is_empty() {
            *value = default.to_string();
        }
    };
    fill(&mut routing.sending_application, &engine.sending_application);
    fill(&mut routing.sending_facility, &engine.sending_facility);
    fill(&mut routing.receiving_application, &partner.receiving_application);
    fill(&mut routing.receiving_facility, &partner.receiving_facility);
}
