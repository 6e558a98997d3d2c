//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Caduceus using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Caduceus - HL7v2 message engine
#[derive(Parser, Debug)]
#[command(name = "caduceus")]
#[command(version, about, long_about = None)]
#[command(author = "Caduceus Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "caduceus.toml", env = "CADUCEUS_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CADUCEUS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept inbound messages and answer each with an acknowledgment
    Listen(commands::listen::ListenArgs),

    /// Build an event and send it to a configured partner
    Send(commands::send::SendArgs),

    /// Parse a message file and print its model as JSON
    Parse(commands::parse::ParseArgs),

    /// Convert between HL7v2 and FHIR JSON
    Convert(commands::convert::ConvertArgs),

    /// Show engine health and supported message types
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::convert::ConvertDirection;

    #[test]
    fn test_cli_parse_listen() {
        let cli = Cli::parse_from(["caduceus", "listen"]);
        assert_eq!(cli.config, "caduceus.toml");
        assert!(matches!(cli.command, Commands::Listen(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["caduceus", "--config", "custom.toml", "status"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["caduceus", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_send() {
        let cli = Cli::parse_from(["caduceus", "send", "--partner", "lab", "--event", "event.json"]);
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.partner, "lab");
        assert_eq!(args.event.to_str(), Some("event.json"));
    }

    #[test]
    fn test_cli_parse_convert() {
        let cli = Cli::parse_from(["caduceus", "convert", "to-fhir", "adt.hl7", "--message-type", "ADT"]);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert!(matches!(args.direction, ConvertDirection::ToFhir(_)));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["caduceus", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["caduceus", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
