//! One-way audit sink
//!
//! Every inbound message and every outbound send produces one
//! [`AuditEntry`]. Payloads are stored only as SHA-256 digests.

pub mod file;

pub use file::FileAuditSink;

use crate::config::AuditConfig;
use crate::domain::Result;
use crate::hl7::AckCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Direction of an audited exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One audited exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub message_key: Option<String>,
    pub control_id: Option<String>,
    pub ack_code: Option<AckCode>,
    pub detail: Option<String>,
    pub endpoint: Option<String>,
    /// SHA-256 of the raw message text (never the plaintext)
    pub payload_sha256: String,
}

impl AuditEntry {
    fn new(direction: Direction, raw: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            direction,
            message_key: None,
            control_id: None,
            ack_code: None,
            detail: None,
            endpoint: None,
            payload_sha256: payload_digest(raw),
        }
    }

    /// Entry for a received message
    pub fn inbound(raw: &str) -> Self {
        Self::new(Direction::Inbound, raw)
    }

    /// Entry for a message sent to a partner
    pub fn outbound(raw: &str, endpoint: impl Into<String>) -> Self {
        let mut entry = Self::new(Direction::Outbound, raw);
        entry.endpoint = Some(endpoint.into());
        entry
    }

    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = Some(key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_control_id(mut self, control_id: impl Into<String>) -> Self {
        self.control_id = Some(control_id.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn with_ack_code(mut self, code: Option<AckCode>) -> Self {
        self.ack_code = code;
        self
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

/// SHA-256 hex digest of a payload
pub fn payload_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Receiver of audit entries
///
/// Failures are reported to the caller, which logs them; a failing sink
/// never changes the acknowledgment a message receives.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Writes entries as structured tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        tracing::info!(
            audit_id = %entry.id,
            direction = ?entry.direction,
            message_key = entry.message_key.as_deref().unwrap_or(""),
            control_id = entry.control_id.as_deref().unwrap_or(""),
            ack_code = entry.ack_code.map(|c| c.as_str()).unwrap_or(""),
            endpoint = entry.endpoint.as_deref().unwrap_or(""),
            payload_sha256 = %entry.payload_sha256,
            "Audit"
        );
        Ok(())
    }
}

/// Discards entries
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: &AuditEntry) -> Result<()> {
        Ok(())
    }
}

/// Sink described by the `[audit]` section
///
/// A disabled audit section still logs entries through tracing.
pub fn sink_from_config(config: &AuditConfig) -> Result<Arc<dyn AuditSink>> {
    if config.enabled {
        Ok(Arc::new(FileAuditSink::new(
            config.log_path.clone().into(),
            config.json_format,
        )?))
    } else {
        Ok(Arc::new(TracingAuditSink))
    }
}
