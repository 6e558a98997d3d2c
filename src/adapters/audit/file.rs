//! Append-only audit file

use super::{AuditEntry, AuditSink};
use crate::domain::{CaduceusError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends one line per entry, JSON or plain text
pub struct FileAuditSink {
    log_path: PathBuf,
    json_format: bool,
    // serialises appends from concurrent connections
    lock: Mutex<()>,
}

impl FileAuditSink {
    /// Create a sink, creating the parent directory when needed
    pub fn new(log_path: PathBuf, json_format: bool) -> Result<Self> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CaduceusError::Io(format!(
                    "Failed to create audit log directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        Ok(Self {
            log_path,
            json_format,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn format_line(&self, entry: &AuditEntry) -> Result<String> {
        if self.json_format {
            return Ok(serde_json::to_string(entry)?);
        }
        Ok(format!(
            "[{}] {:?} | Key: {} | Control ID: {} | ACK: {} | Endpoint: {} | SHA-256: {}",
            entry.timestamp.to_rfc3339(),
            entry.direction,
            entry.message_key.as_deref().unwrap_or("-"),
            entry.control_id.as_deref().unwrap_or("-"),
            entry.ack_code.map(|c| c.as_str()).unwrap_or("-"),
            entry.endpoint.as_deref().unwrap_or("-"),
            entry.payload_sha256
        ))
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        let line = self.format_line(entry)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| CaduceusError::Other("audit log lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                CaduceusError::Io(format!(
                    "Failed to open audit log {}: {e}",
                    self.log_path.display()
                ))
            })?;

        writeln!(file, "{line}")
            .map_err(|e| CaduceusError::Io(format!("Failed to write audit entry: {e}")))?;
        Ok(())
    }
}
