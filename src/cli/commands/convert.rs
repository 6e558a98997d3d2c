//! Convert command implementation
//!
//! This module implements `convert to-fhir` and `convert to-hl7`.

use super::load_or_default;
use crate::config::{CaduceusConfig, PartnerConfig};
use crate::core::builder::MessageBuilder;
use crate::core::events::Routing;
use crate::fhir::{FhirConverter, FhirInput, FhirMapper};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(subcommand)]
    pub direction: ConvertDirection,
}

/// Conversion direction
#[derive(Subcommand, Debug)]
pub enum ConvertDirection {
    /// HL7v2 message file to FHIR JSON
    ToFhir(ToFhirArgs),

    /// FHIR JSON file (one resource or an array) to an HL7v2 message
    ToHl7(ToHl7Args),
}

/// Arguments for `convert to-fhir`
#[derive(Args, Debug)]
pub struct ToFhirArgs {
    /// HL7v2 message file
    pub file: PathBuf,

    /// Expected message type, `ADT`, `ORU` or a full key such as `ADT^A01`
    #[arg(short, long)]
    pub message_type: String,

    /// Apply this partner's PID layout instead of detecting it
    #[arg(short, long)]
    pub partner: Option<String>,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `convert to-hl7`
#[derive(Args, Debug)]
pub struct ToHl7Args {
    /// FHIR JSON file
    pub file: PathBuf,

    /// Target message type, `ADT^A01`, `ADT^A02`, `ADT^A03` or `ORU^R01`
    #[arg(short, long)]
    pub message_type: String,

    /// Partner supplying MSH-5, MSH-6 and the encoding characters
    #[arg(short, long)]
    pub partner: Option<String>,

    /// Write the message to a file (exact wire bytes) instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    /// Execute the convert command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration file");
                eprintln!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        match &self.direction {
            ConvertDirection::ToFhir(args) => args.execute(&config),
            ConvertDirection::ToHl7(args) => args.execute(&config),
        }
    }
}

impl ToFhirArgs {
    fn execute(&self, config: &CaduceusConfig) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file.display(), message_type = %self.message_type, "Converting to FHIR");

        let mapper = match &self.partner {
            Some(name) => match config.partner(name) {
                Some(partner) => FhirMapper::with_layout(partner.pid_layout),
                None => {
                    eprintln!("❌ Unknown partner: {name}");
                    return Ok(2); // Configuration error exit code
                }
            },
            None => FhirMapper::new(),
        };

        let Some(raw) = read_input(&self.file) else {
            return Ok(5); // Fatal error exit code
        };

        let converter = FhirConverter::new(mapper, MessageBuilder::standard());
        match converter.to_fhir(&raw, &self.message_type) {
            Ok(output) => {
                let json = serde_json::to_string_pretty(&output)?;
                write_output(self.output.as_deref(), &json, &json)?;
                Ok(0)
            }
            Err(e) => {
                eprintln!("❌ Conversion failed");
                eprintln!("   Error: {e}");
                Ok(1)
            }
        }
    }
}

impl ToHl7Args {
    fn execute(&self, config: &CaduceusConfig) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file.display(), message_type = %self.message_type, "Converting to HL7");

        let default_partner = PartnerConfig::default();
        let partner = match &self.partner {
            Some(name) => match config.partner(name) {
                Some(partner) => partner,
                None => {
                    eprintln!("❌ Unknown partner: {name}");
                    return Ok(2); // Configuration error exit code
                }
            },
            None => &default_partner,
        };
        let options = match config.engine.build_options(partner) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("❌ Invalid partner settings");
                eprintln!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let Some(contents) = read_input(&self.file) else {
            return Ok(5); // Fatal error exit code
        };
        let input: FhirInput = match serde_json::from_str(&contents) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("❌ {} is not a Patient or Observation resource", self.file.display());
                eprintln!("   Error: {e}");
                return Ok(1);
            }
        };

        let routing = Routing::new(
            config.engine.sending_application.clone(),
            config.engine.sending_facility.clone(),
            partner.receiving_application.clone(),
            partner.receiving_facility.clone(),
        );
        let converter = FhirConverter::new(
            FhirMapper::new(),
            MessageBuilder::standard().with_options(options),
        );
        match converter.to_hl7(input, &self.message_type, &routing) {
            Ok(message) => {
                write_output(self.output.as_deref(), &message, &message.replace('\r', "\n"))?;
                Ok(0)
            }
            Err(e) => {
                eprintln!("❌ Conversion failed");
                eprintln!("   Error: {e}");
                Ok(1)
            }
        }
    }
}

fn read_input(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            eprintln!("❌ Failed to read {}", path.display());
            eprintln!("   Error: {e}");
            None
        }
    }
}

/// `exact` goes to the file; stdout gets the `display` form
fn write_output(path: Option<&Path>, exact: &str, display: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, exact)?;
            eprintln!("✅ Written to {}", path.display());
            Ok(())
        }
        None => {
            println!("{display}");
            Ok(())
        }
    }
}
