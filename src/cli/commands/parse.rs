//! Parse command implementation
//!
//! This module implements the `parse` command for inspecting a message file.

use crate::core::decoder::decode_event;
use crate::hl7::parse;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the parse command
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// File holding one HL7v2 message
    pub file: PathBuf,

    /// Print the decoded structured event instead of the segment model
    #[arg(long)]
    pub event: bool,
}

impl ParseArgs {
    /// Execute the parse command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file.display(), "Parsing message file");

        let raw = match std::fs::read_to_string(&self.file) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("❌ Failed to read {}", self.file.display());
                eprintln!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        let message = match parse(&raw) {
            Ok(message) => message,
            Err(e) => {
                eprintln!("❌ Message could not be parsed");
                eprintln!("   Error: {e}");
                return Ok(1);
            }
        };

        let json = if self.event {
            match decode_event(&message) {
                Ok(event) => serde_json::to_string_pretty(&event)?,
                Err(e) => {
                    eprintln!("❌ Message could not be decoded");
                    eprintln!("   Error: {e}");
                    return Ok(1);
                }
            }
        } else {
            serde_json::to_string_pretty(&message)?
        };

        println!("{json}");
        Ok(0)
    }
}
