//! Outbound client
//!
//! Builds an event, records it, hands it to the partner's transport and
//! checks the acknowledgment that comes back. Nothing is sent when the build
//! fails, and nothing is retried.

use super::builder::MessageBuilder;
use super::events::StructuredEvent;
use crate::adapters::audit::{AuditEntry, AuditSink};
use crate::adapters::transport::{transport_for, Transport};
use crate::config::{EngineConfig, PartnerConfig};
use crate::domain::{CaduceusError, Hl7Error, Result};
use crate::hl7::ack::{ack_code_of, ack_text, acknowledged_control_id};
use crate::hl7::{encode, parse, AckCode, Message};
use crate::{log_error_with_context, log_transport_attempt};
use serde::Serialize;
use std::sync::Arc;

/// What happened to one outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReport {
    pub message_key: String,
    pub control_id: String,
    pub endpoint: String,
    /// Partner's MSA-1; `None` when the transport returned no reply
    pub ack_code: Option<AckCode>,
    /// Partner's MSA-3
    pub ack_text: Option<String>,
}

impl OutboundReport {
    pub fn is_accepted(&self) -> bool {
        self.ack_code.map(|code| code.is_accept()).unwrap_or(false)
    }
}

/// Sends events to one partner endpoint
#[derive(Clone)]
pub struct OutboundClient {
    builder: MessageBuilder,
    transport: Arc<dyn Transport>,
    audit: Arc<dyn AuditSink>,
    endpoint: String,
}

impl OutboundClient {
    pub fn new(
        builder: MessageBuilder,
        transport: Arc<dyn Transport>,
        audit: Arc<dyn AuditSink>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            builder,
            transport,
            audit,
            endpoint: endpoint.into(),
        }
    }

    /// Client for a configured partner, using its encoding and transport
    pub fn for_partner(
        engine: &EngineConfig,
        partner: &PartnerConfig,
        builder: &MessageBuilder,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let builder = builder.with_options(engine.build_options(partner)?);
        let transport = transport_for(partner)?;
        Ok(Self::new(builder, transport, audit, partner.endpoint.clone()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds and sends an event
    ///
    /// # Errors
    ///
    /// Build failures ([`CaduceusError::Hl7`]) before anything is sent,
    /// transport failures ([`CaduceusError::Transport`]) unchanged, and a
    /// reply that is not an acknowledgment for this message.
    pub async fn send_event(&self, event: &StructuredEvent) -> Result<OutboundReport> {
        let message = self.builder.build_message(event)?;
        self.send_message(&message).await
    }

    /// Sends an already built message
    pub async fn send_message(&self, message: &Message) -> Result<OutboundReport> {
        let text = encode(message);
        let control_id = message.control_id().to_string();
        let message_key = format!("{}^{}", message.message_type(), message.trigger_event());

        let entry = AuditEntry::outbound(&text, self.endpoint.clone())
            .with_message_key(message_key.clone())
            .with_control_id(control_id.clone());
        if let Err(e) = self.audit.record(&entry) {
            log_error_with_context!(e, "Failed to record audit entry");
        }

        log_transport_attempt!(self.endpoint, control_id);
        let reply = self.transport.send(&text, &self.endpoint).await?;

        let mut report = OutboundReport {
            message_key,
            control_id,
            endpoint: self.endpoint.clone(),
            ack_code: None,
            ack_text: None,
        };

        let Some(reply) = reply else {
            tracing::debug!(endpoint = %self.endpoint, "Transport returned no reply");
            return Ok(report);
        };

        let ack = parse(&reply)?;
        let code = ack_code_of(&ack).ok_or_else(|| {
            Hl7Error::MalformedMessage("reply has no valid MSA segment".to_string())
        })?;

        let acknowledged = acknowledged_control_id(&ack).unwrap_or_default();
        if acknowledged != report.control_id {
            return Err(CaduceusError::Validation(format!(
                "acknowledgment references control ID '{}', expected '{}'",
                acknowledged, report.control_id
            )));
        }

        tracing::info!(
            endpoint = %self.endpoint,
            control_id = %report.control_id,
            ack_code = %code,
            "Partner acknowledged message"
        );
        report.ack_code = Some(code);
        report.ack_text = ack_text(&ack).map(str::to_string);
        Ok(report)
    }
}
