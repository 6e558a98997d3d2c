//! Example demonstrating the Caduceus logging system
//!
//! This example shows how to:
//! - Initialize structured logging
//! - Use the engine logging macros
//! - Receive a message through the intake service
//!
//! Run with:
//! ```bash
//! cargo run --example logging_example
//! ```

use caduceus::adapters::audit::TracingAuditSink;
use caduceus::config::LoggingConfig;
use caduceus::core::dispatcher::Dispatcher;
use caduceus::core::intake::IntakeService;
use caduceus::core::registry::{AcceptingHandler, RegistryBuilder};
use caduceus::domain::Hl7Error;
use caduceus::hl7::AckCode;
use caduceus::logging::init_logging;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggingConfig {
        local_enabled: true,
        local_path: "/tmp/caduceus_example".to_string(),
        local_rotation: "daily".to_string(),
        local_max_size_mb: 100,
    };

    // Initialize logging (keep the guard alive for the duration of the program)
    let _guard = init_logging("info", &config)?;

    tracing::info!("Caduceus logging example started");
    tracing::debug!("This is a debug message");

    // Use structured logging with fields
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = "development",
        "Engine initialized"
    );

    // Engine logging macros
    caduceus::log_message_received!("ADT^A01", "MSG00001", 3);
    caduceus::log_ack_generated!(AckCode::ApplicationAccept, "MSG00001");
    caduceus::log_transport_attempt!("tcp://ehr.example.org:2575", "MSG00002");

    let error = Hl7Error::UnsupportedMessageType("ZZZ^Z01".to_string());
    caduceus::log_dispatch_failure!("ZZZ^Z01", "MSG00003", &error);
    caduceus::log_error_with_context!(&error, "Demonstrating error logging");

    // The intake service logs receipt, dispatch and acknowledgment on its own
    let registry = RegistryBuilder::new()
        .with_standard_templates()
        .handler_for_templates(Arc::new(AcceptingHandler))
        .build();
    let intake = IntakeService::new(Dispatcher::new(Arc::new(registry)), Arc::new(TracingAuditSink));

    let outcome = intake
        .receive("MSH|^~\\&|EHR|WARD|CADUCEUS|HOSP|20240101120000||ADT^A01|MSG00004|P|2.5\rPID|1||P001||Smith^Jane\r")
        .await;
    tracing::info!(ack_code = %outcome.code, "Example message acknowledged");

    let outcome = intake.receive("not a message").await;
    tracing::info!(ack_code = %outcome.code, "Garbage input rejected");

    tracing::info!("Caduceus logging example completed");

    println!("\n✅ Logging example completed successfully!");
    println!("📁 Check logs in: /tmp/caduceus_example/caduceus.log");
    println!("💡 Logs are in JSON format for production use");

    Ok(())
}
