//! Engine status introspection

use super::registry::MessageTypeRegistry;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Read-only health report
///
/// The engine keeps no persisted state, so the report is limited to what the
/// running process knows about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: String,
    pub version: String,
    pub supported_message_types: Vec<String>,
    pub uptime_seconds: u64,
}

impl EngineStatus {
    pub const OPERATIONAL: &'static str = "operational";

    /// Report for a registry that has been running for `uptime`
    pub fn report(registry: &MessageTypeRegistry, uptime: Duration) -> Self {
        Self {
            state: Self::OPERATIONAL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            supported_message_types: registry
                .supported_types()
                .iter()
                .map(ToString::to_string)
                .collect(),
            uptime_seconds: uptime.as_secs(),
        }
    }

    pub fn is_operational(&self) -> bool {
        self.state == Self::OPERATIONAL
    }
}

/// Tracks process start for uptime reporting
#[derive(Debug, Clone, Copy)]
pub struct StatusTracker {
    started: Instant,
}

impl StatusTracker {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn status(&self, registry: &MessageTypeRegistry) -> EngineStatus {
        EngineStatus::report(registry, self.started.elapsed())
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::start()
    }
}
