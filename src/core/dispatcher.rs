//! Dispatcher
//!
//! Routes a parsed message to the handler registered for its type and trigger
//! event, and turns the outcome into exactly one acknowledgment.

use super::registry::{HandlerResult, MessageTypeRegistry};
use crate::domain::Hl7Error;
use crate::hl7::{generate_ack, generate_error_ack, AckCode, Message};
use crate::log_dispatch_failure;
use std::sync::Arc;
use std::time::Duration;

/// Routes inbound messages through an injected registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MessageTypeRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<MessageTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MessageTypeRegistry {
        &self.registry
    }

    /// Invokes the handler for the message's type and trigger event
    ///
    /// # Errors
    ///
    /// [`Hl7Error::UnsupportedMessageType`] when MSH-9 is incomplete or no
    /// handler is registered; otherwise whatever the handler returned.
    pub async fn dispatch(&self, message: &Message) -> HandlerResult {
        let key = message.key().ok_or_else(|| {
            Hl7Error::UnsupportedMessageType(format!(
                "MSH-9 '{}^{}' does not name a message type and trigger event",
                message.message_type(),
                message.trigger_event()
            ))
        })?;

        let handler = self
            .registry
            .handler(&key)
            .ok_or_else(|| Hl7Error::UnsupportedMessageType(key.to_string()))?;

        handler.handle(message).await
    }

    /// [`Dispatcher::dispatch`] bounded by a deadline
    ///
    /// An elapsed deadline is reported as [`Hl7Error::Timeout`]. The handler
    /// future is dropped at that point.
    pub async fn dispatch_with_deadline(
        &self,
        message: &Message,
        deadline: Duration,
    ) -> HandlerResult {
        match tokio::time::timeout(deadline, self.dispatch(message)).await {
            Ok(result) => result,
            Err(_) => Err(Hl7Error::Timeout(deadline.as_millis() as u64)),
        }
    }

    /// Dispatches and acknowledges a message
    ///
    /// Always yields one acknowledgment: `AA` on success, otherwise the code
    /// the error maps to, together with the error itself.
    pub async fn acknowledge(
        &self,
        message: &Message,
        deadline: Option<Duration>,
    ) -> (Message, Option<Hl7Error>) {
        let result = match deadline {
            Some(deadline) => self.dispatch_with_deadline(message, deadline).await,
            None => self.dispatch(message).await,
        };

        match result {
            Ok(()) => (generate_ack(message, AckCode::ApplicationAccept, None), None),
            Err(error) => {
                let key = format!("{}^{}", message.message_type(), message.trigger_event());
                log_dispatch_failure!(key, message.control_id(), &error);
                (generate_error_ack(message, &error), Some(error))
            }
        }
    }
}
