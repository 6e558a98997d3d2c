//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted file logs
//! - Configurable log levels
//! - Local file logging with rotation
//!
//! Message payloads are never logged; events carry the message key, control
//! ID and acknowledgment code only.
//!
//! # Example
//!
//! ```no_run
//! use caduceus::logging::init_logging;
//! use caduceus::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Engine started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log an inbound message after it parsed
///
/// # Example
///
/// ```no_run
/// use caduceus::log_message_received;
///
/// log_message_received!("ADT^A01", "MSG00001", 4);
/// ```
#[macro_export]
macro_rules! log_message_received {
    ($message_key:expr, $control_id:expr, $segment_count:expr) => {
        tracing::info!(
            message_key = %$message_key,
            control_id = %$control_id,
            segment_count = $segment_count,
            "Message received"
        );
    };
}

/// Log the acknowledgment produced for an inbound message
///
/// # Example
///
/// ```no_run
/// use caduceus::log_ack_generated;
/// use caduceus::hl7::AckCode;
///
/// log_ack_generated!(AckCode::ApplicationAccept, "MSG00001");
/// ```
#[macro_export]
macro_rules! log_ack_generated {
    ($ack_code:expr, $control_id:expr) => {
        tracing::info!(
            ack_code = %$ack_code,
            control_id = %$control_id,
            "Acknowledgment generated"
        );
    };
}

/// Log a dispatch that ended in an error acknowledgment
///
/// # Example
///
/// ```no_run
/// use caduceus::log_dispatch_failure;
/// use caduceus::domain::Hl7Error;
///
/// let error = Hl7Error::UnsupportedMessageType("ZZZ^Z01".to_string());
/// log_dispatch_failure!("ZZZ^Z01", "MSG00001", &error);
/// ```
#[macro_export]
macro_rules! log_dispatch_failure {
    ($message_key:expr, $control_id:expr, $error:expr) => {
        tracing::warn!(
            message_key = %$message_key,
            control_id = %$control_id,
            error = %$error,
            "Dispatch failed"
        );
    };
}

/// Log an outbound send attempt
///
/// # Example
///
/// ```no_run
/// use caduceus::log_transport_attempt;
///
/// log_transport_attempt!("tcp://lab.example.org:2575", "MSG00001");
/// ```
#[macro_export]
macro_rules! log_transport_attempt {
    ($endpoint:expr, $control_id:expr) => {
        tracing::debug!(
            endpoint = %$endpoint,
            control_id = %$control_id,
            "Sending message"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use caduceus::log_error_with_context;
/// use caduceus::domain::CaduceusError;
///
/// let error = CaduceusError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
