//! Domain error types
//!
//! This module defines the error hierarchy for Caduceus. Errors are grouped by
//! the layer that raises them and never expose third-party types.

use crate::hl7::ack::AckCode;
use thiserror::Error;

/// Main Caduceus error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CaduceusError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HL7 engine errors (parse, dispatch, mapping)
    #[error("HL7 error: {0}")]
    Hl7(#[from] Hl7Error),

    /// Transport adapter errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// HL7 engine errors
///
/// Every variant maps onto an acknowledgment code through [`Hl7Error::ack_code`],
/// so a failure anywhere between parse and dispatch still produces a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Hl7Error {
    /// Structural parse failure (missing MSH, bad encoding header, empty input)
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Encoding characters are not five distinct characters
    #[error("Invalid encoding characters: {0}")]
    InvalidEncoding(String),

    /// Well-formed message with no registered handler or template
    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    /// Business handler reported a failure
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Handler did not finish before the caller's deadline
    #[error("Processing deadline of {0}ms exceeded")]
    Timeout(u64),

    /// A segment required by a mapping is absent
    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    /// A required field is missing or cannot be converted
    #[error("Field mapping failed for {field}: {reason}")]
    FieldMapping { field: String, reason: String },

    /// The message declares a different type than the caller asked for
    #[error("Message type mismatch: expected {expected}, got {actual}")]
    MessageTypeMismatch { expected: String, actual: String },
}

impl Hl7Error {
    /// Shorthand for [`Hl7Error::FieldMapping`]
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Hl7Error::FieldMapping {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Acknowledgment code earned when this error stops intake of raw text
    ///
    /// Only parse failures reject; a message that parsed is answered `AE`
    /// by [`crate::hl7::generate_error_ack`] whatever the error.
    pub fn ack_code(&self) -> AckCode {
        match self {
            Hl7Error::MalformedMessage(_) | Hl7Error::InvalidEncoding(_) => AckCode::ApplicationReject,
            _ => AckCode::ApplicationError,
        }
    }
}

/// Transport adapter errors
///
/// Raised by [`crate::adapters::transport::Transport`] implementations and
/// surfaced to callers unchanged. The engine does not retry on any of them.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Endpoint string could not be interpreted
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failed to open a connection
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// Read or write failure on an open connection
    #[error("I/O failure: {0}")]
    Io(String),

    /// Peer sent bytes that do not form a valid frame
    #[error("Framing error: {0}")]
    Framing(String),

    /// Non-success HTTP status
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Operation timed out
    #[error("Transport timeout: {0}")]
    Timeout(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for CaduceusError {
    fn from(err: std::io::Error) -> Self {
        CaduceusError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CaduceusError {
    fn from(err: serde_json::Error) -> Self {
        CaduceusError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CaduceusError {
    fn from(err: toml::de::Error) -> Self {
        CaduceusError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caduceus_error_display() {
        let err = CaduceusError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_hl7_error_conversion() {
        let hl7_err = Hl7Error::MalformedMessage("empty input".to_string());
        let err: CaduceusError = hl7_err.into();
        assert!(matches!(err, CaduceusError::Hl7(_)));
    }

    #[test]
    fn test_transport_error_conversion() {
        let transport_err = TransportError::Timeout("5 seconds".to_string());
        let err: CaduceusError = transport_err.into();
        assert!(matches!(err, CaduceusError::Transport(_)));
    }

    #[test]
    fn test_ack_code_mapping() {
        assert_eq!(
            Hl7Error::MalformedMessage("x".into()).ack_code(),
            AckCode::ApplicationReject
        );
        assert_eq!(
            Hl7Error::UnsupportedMessageType("ZZZ^Z01".into()).ack_code(),
            AckCode::ApplicationError
        );
        assert_eq!(
            Hl7Error::Handler("db down".into()).ack_code(),
            AckCode::ApplicationError
        );
        assert_eq!(Hl7Error::Timeout(50).ack_code(), AckCode::ApplicationError);
    }

    #[test]
    fn test_field_mapping_display() {
        let err = Hl7Error::field("PID-5", "patient name is empty");
        assert_eq!(
            err.to_string(),
            "Field mapping failed for PID-5: patient name is empty"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: CaduceusError = io_err.into();
        assert!(matches!(err, CaduceusError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: CaduceusError = toml_err.into();
        assert!(matches!(err, CaduceusError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
