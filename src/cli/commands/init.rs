//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "caduceus.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Caduceus configuration");
        println!();

        // Check if file already exists
        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your sender and partner settings", self.output);
                println!("  2. Create a .env file for partner secrets:");
                println!("     - Set CADUCEUS_LAB_TOKEN (if the lab partner uses HTTP)");
                println!("  3. Validate configuration: caduceus validate-config");
                println!("  4. Start the listener: caduceus listen");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Caduceus Configuration File
# HL7v2 message engine

[application]
log_level = "info"
environment = "development"

[engine]
sending_application = "CADUCEUS"
sending_facility = "HOSPITAL"
processing_id = "P"
version_id = "2.5"
dispatch_timeout_ms = 5000

[listener]
enabled = true
bind_address = "0.0.0.0:2575"
framing = "mllp"
max_connections = 64
read_timeout_seconds = 300

[[partners]]
name = "ehr"
endpoint = "tcp://ehr.example.org:2575"
receiving_application = "EHR"
receiving_facility = "WARD"

[audit]
enabled = true
log_path = "./audit/caduceus-audit.log"
json_format = true

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Caduceus Configuration File
# HL7v2 message engine
#
# This file contains all configuration options with examples and explanations.
# Values of the form ${VAR} are replaced with environment variables when the
# file is loaded. Any key can also be overridden with CADUCEUS_<SECTION>_<KEY>,
# e.g. CADUCEUS_ENGINE_SENDING_FACILITY.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Environment (development, staging, production)
# Production requires https:// for HTTP partners
environment = "development"

# ============================================================================
# Engine Settings
# ============================================================================
[engine]
# MSH-3 and MSH-4 of every outbound message
sending_application = "CADUCEUS"
sending_facility = "HOSPITAL"

# MSH-11: P (production), D (debugging) or T (training)
processing_id = "P"

# MSH-12
version_id = "2.5"

# Deadline for one dispatch; an elapsed deadline is acknowledged with AE
dispatch_timeout_ms = 5000

# ============================================================================
# Inbound Listener
# ============================================================================
[listener]
enabled = true
bind_address = "0.0.0.0:2575"

# mllp: 0x0B <message> 0x1C 0x0D, many messages per connection
# raw: one message per connection, ended by closing the write side
framing = "mllp"

# Concurrent connections (1-10000)
max_connections = 64

# Idle seconds before a connection is closed
read_timeout_seconds = 300

# ============================================================================
# Outbound Partners
# ============================================================================
[[partners]]
name = "ehr"
endpoint = "tcp://ehr.example.org:2575"
framing = "mllp"
receiving_application = "EHR"
receiving_facility = "WARD"

# Field, component, repetition, escape and subcomponent characters
encoding_characters = "|^~\\&"

# standard or shifted (PID fields one position early)
pid_layout = "standard"

# Connect and reply timeout in seconds (1-600)
timeout_seconds = 30

[[partners]]
name = "lab"
endpoint = "https://lab.example.org/hl7"
receiving_application = "LIS"
receiving_facility = "LAB"

# Sent as a bearer token (use environment variable)
auth_token = "${CADUCEUS_LAB_TOKEN}"

# ============================================================================
# Audit Trail
# ============================================================================
[audit]
# One entry per message; payloads are stored as SHA-256 digests only
enabled = true
log_path = "./audit/caduceus-audit.log"
json_format = true

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local file logging (JSON)
local_enabled = true
local_path = "./logs"

# Log rotation (daily or hourly)
local_rotation = "daily"

# Maximum log file size in MB
local_max_size_mb = 100
"#
        .to_string()
    }
}
