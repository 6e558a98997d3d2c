//! Inbound message intake
//!
//! The boundary between a transport and the engine: raw text in, exactly one
//! acknowledgment out.

use super::dispatcher::Dispatcher;
use crate::adapters::audit::{AuditEntry, AuditSink};
use crate::domain::Hl7Error;
use crate::hl7::ack::ack_code_of;
use crate::hl7::{encode, generate_reject, parse, AckCode, Message};
use crate::{log_ack_generated, log_error_with_context, log_message_received};
use std::sync::Arc;
use std::time::Duration;

/// Result of receiving one inbound message
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    /// The acknowledgment message
    pub ack: Message,
    /// The acknowledgment in wire form
    pub ack_text: String,
    pub code: AckCode,
    /// Why the message was not accepted
    pub error: Option<Hl7Error>,
    /// Control ID of the inbound message, when it could be read
    pub control_id: Option<String>,
    pub message_key: Option<String>,
}

impl IntakeOutcome {
    pub fn is_accepted(&self) -> bool {
        self.code.is_accept()
    }

    /// Detail text for non-accept outcomes
    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Parses, dispatches and acknowledges inbound messages
#[derive(Clone)]
pub struct IntakeService {
    dispatcher: Dispatcher,
    audit: Arc<dyn AuditSink>,
    deadline: Option<Duration>,
}

impl IntakeService {
    pub fn new(dispatcher: Dispatcher, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            dispatcher,
            audit,
            deadline: None,
        }
    }

    /// Bound every dispatch by `deadline`
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Receive one raw message
    ///
    /// Never fails: a parse failure yields an `AR`, any dispatch failure an
    /// `AE`, and success an `AA`.
    pub async fn receive(&self, raw: &str) -> IntakeOutcome {
        let outcome = match parse(raw) {
            Ok(message) => self.receive_parsed(message).await,
            Err(error) => reject(raw, error),
        };

        log_ack_generated!(
            outcome.code,
            outcome.control_id.as_deref().unwrap_or("")
        );
        self.audit_outcome(raw, &outcome);
        outcome
    }

    async fn receive_parsed(&self, message: Message) -> IntakeOutcome {
        let key = format!("{}^{}", message.message_type(), message.trigger_event());
        log_message_received!(key, message.control_id(), message.segments().len());

        let (ack, error) = self.dispatcher.acknowledge(&message, self.deadline).await;
        finish(ack, error, Some(message.control_id().to_string()), Some(key))
    }

    fn audit_outcome(&self, raw: &str, outcome: &IntakeOutcome) {
        let mut entry = AuditEntry::inbound(raw)
            .with_ack_code(Some(outcome.code))
            .with_detail(outcome.error_detail());
        if let Some(key) = &outcome.message_key {
            entry = entry.with_message_key(key.clone());
        }
        if let Some(control_id) = &outcome.control_id {
            entry = entry.with_control_id(control_id.clone());
        }

        if let Err(e) = self.audit.record(&entry) {
            log_error_with_context!(e, "Failed to record audit entry");
        }
    }
}

fn reject(raw: &str, error: Hl7Error) -> IntakeOutcome {
    tracing::warn!(error = %error, "Rejecting unparseable message");
    let ack = generate_reject(raw, &error);
    let control_id = crate::hl7::ack::acknowledged_control_id(&ack)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    finish(ack, Some(error), control_id, None)
}

fn finish(
    ack: Message,
    error: Option<Hl7Error>,
    control_id: Option<String>,
    message_key: Option<String>,
) -> IntakeOutcome {
    let code = ack_code_of(&ack).unwrap_or_else(|| {
        error
            .as_ref()
            .map(Hl7Error::ack_code)
            .unwrap_or(AckCode::ApplicationAccept)
    });
    IntakeOutcome {
        ack_text: encode(&ack),
        ack,
        code,
        error,
        control_id: control_id.filter(|id| !id.is_empty()),
        message_key,
    }
}
