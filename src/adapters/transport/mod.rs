//! Transport adapters
//!
//! The engine hands finished wire text to a [`Transport`] and never retries;
//! whatever error the adapter observed is surfaced to the caller unchanged.

pub mod http;
pub mod listener;
pub mod mllp;

pub use http::HttpTransport;
pub use listener::MllpListener;
pub use mllp::{FrameCodec, Framing, MllpTransport};

use crate::config::PartnerConfig;
use crate::domain::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Delivers a message to a partner endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `message` and returns the partner's reply, if it sent one
    async fn send(&self, message: &str, endpoint: &str) -> Result<Option<String>, TransportError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Creates the transport a partner's endpoint calls for
///
/// `http://` and `https://` endpoints use [`HttpTransport`]; everything else
/// is treated as a TCP address and uses [`MllpTransport`] with the partner's
/// framing.
pub fn transport_for(partner: &PartnerConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let timeout = Duration::from_secs(partner.timeout_seconds);

    if partner.is_http() {
        tracing::debug!(partner = %partner.name, "Creating HTTP transport");
        let transport = HttpTransport::new(timeout, partner.auth_token.as_ref())?;
        return Ok(Arc::new(transport));
    }

    mllp::tcp_address(&partner.endpoint)?;
    tracing::debug!(partner = %partner.name, framing = %partner.framing, "Creating TCP transport");
    Ok(Arc::new(MllpTransport::new(partner.framing, timeout)))
}
