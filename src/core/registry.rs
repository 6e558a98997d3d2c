//! Message Type Registry
//!
//! Maps a message type and trigger event to an outbound segment template
//! and an inbound handler. The registry is assembled once through
//! [`RegistryBuilder`] and is immutable afterwards, so it can be shared
//! between connections behind an `Arc`.

use crate::domain::{Hl7Result, MessageKey};
use crate::hl7::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Result of a business handler
pub type HandlerResult = Hl7Result<()>;

/// Business logic invoked for an inbound message
///
/// Returning `Err` turns the acknowledgment into `AE` carrying the error
/// text. Handlers are responsible for their own retries.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> HandlerResult;
}

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct FnHandler<F>(F);

/// Wraps a closure as a handler
///
/// The closure receives an owned copy of the message.
///
/// # Examples
///
/// ```
/// use caduceus::core::registry::{handler_fn, RegistryBuilder};
/// use caduceus::domain::MessageKey;
///
/// let registry = RegistryBuilder::new()
///     .with_standard_templates()
///     .handler(MessageKey::ADT_A01, handler_fn(|_message| async { Ok(()) }))
///     .build();
/// assert!(registry.handler(&MessageKey::ADT_A01).is_some());
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, message: &Message) -> HandlerResult {
        (self.0)(message.clone()).await
    }
}

/// Handler that records the message and accepts it
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptingHandler;

#[async_trait]
impl MessageHandler for AcceptingHandler {
    async fn handle(&self, message: &Message) -> HandlerResult {
        tracing::info!(
            message_type = message.message_type(),
            trigger_event = message.trigger_event(),
            control_id = message.control_id(),
            segment_count = message.segments().len(),
            "Accepted message"
        );
        Ok(())
    }
}

/// Segments the builder and decoder know how to populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Event type
    Evn,
    /// Patient identification
    Pid,
    /// Patient visit
    Pv1,
    /// Common order
    Orc,
    /// Observation request
    Obr,
    /// Observation result, one per result line
    Obx,
}

impl SegmentKind {
    pub fn segment_name(&self) -> &'static str {
        match self {
            SegmentKind::Evn => "EVN",
            SegmentKind::Pid => "PID",
            SegmentKind::Pv1 => "PV1",
            SegmentKind::Orc => "ORC",
            SegmentKind::Obr => "OBR",
            SegmentKind::Obx => "OBX",
        }
    }
}

/// One entry of a segment layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateSegment {
    pub kind: SegmentKind,
    /// Inbound messages without this segment cannot be decoded
    pub required: bool,
}

/// Outbound segment layout for one message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    pub key: MessageKey,
    /// MSH-9.3 message structure, e.g. `ADT_A01`
    pub structure: String,
    pub segments: Vec<TemplateSegment>,
}

impl SegmentTemplate {
    pub fn new(key: MessageKey, structure: impl Into<String>) -> Self {
        Self {
            key,
            structure: structure.into(),
            segments: Vec::new(),
        }
    }

    pub fn required(mut self, kind: SegmentKind) -> Self {
        self.segments.push(TemplateSegment {
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, kind: SegmentKind) -> Self {
        self.segments.push(TemplateSegment {
            kind,
            required: false,
        });
        self
    }

    /// True when the layout contains the given segment
    pub fn contains(&self, kind: SegmentKind) -> bool {
        self.segments.iter().any(|s| s.kind == kind)
    }

    /// Layouts for the five supported message types
    pub fn standard() -> Vec<SegmentTemplate> {
        let adt = |key: MessageKey, structure: &str| {
            SegmentTemplate::new(key, structure)
                .optional(SegmentKind::Evn)
                .required(SegmentKind::Pid)
                .required(SegmentKind::Pv1)
        };

        vec![
            adt(MessageKey::ADT_A01, "ADT_A01"),
            adt(MessageKey::ADT_A02, "ADT_A02"),
            adt(MessageKey::ADT_A03, "ADT_A03"),
            SegmentTemplate::new(MessageKey::ORM_O01, "ORM_O01")
                .required(SegmentKind::Pid)
                .required(SegmentKind::Orc)
                .required(SegmentKind::Obr),
            SegmentTemplate::new(MessageKey::ORU_R01, "ORU_R01")
                .required(SegmentKind::Pid)
                .required(SegmentKind::Obr)
                .required(SegmentKind::Obx),
        ]
    }
}

/// Immutable lookup tables from message key to template and handler
#[derive(Default)]
pub struct MessageTypeRegistry {
    templates: HashMap<MessageKey, SegmentTemplate>,
    handlers: HashMap<MessageKey, Arc<dyn MessageHandler>>,
}

impl std::fmt::Debug for MessageTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTypeRegistry")
            .field("templates", &self.template_keys())
            .field("handlers", &self.handler_keys())
            .finish()
    }
}

impl MessageTypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Outbound layout for a key
    pub fn template(&self, key: &MessageKey) -> Option<&SegmentTemplate> {
        self.templates.get(key)
    }

    /// Inbound handler for a key
    pub fn handler(&self, key: &MessageKey) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(key).cloned()
    }

    /// Keys with a registered template, sorted
    pub fn template_keys(&self) -> Vec<MessageKey> {
        sorted(self.templates.keys())
    }

    /// Keys with a registered handler, sorted
    pub fn handler_keys(&self) -> Vec<MessageKey> {
        sorted(self.handlers.keys())
    }

    /// Every key known to the registry in either table, sorted
    pub fn supported_types(&self) -> Vec<MessageKey> {
        let mut keys = self.template_keys();
        for key in self.handler_keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.sort_by_key(|k| k.to_string());
        keys
    }
}

fn sorted<'a>(keys: impl Iterator<Item = &'a MessageKey>) -> Vec<MessageKey> {
    let mut keys: Vec<MessageKey> = keys.cloned().collect();
    keys.sort_by_key(|k| k.to_string());
    keys
}

/// Assembles a [`MessageTypeRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    registry: MessageTypeRegistry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the five supported segment layouts
    pub fn with_standard_templates(mut self) -> Self {
        for template in SegmentTemplate::standard() {
            self.registry.templates.insert(template.key.clone(), template);
        }
        self
    }

    /// Registers or replaces a segment layout
    pub fn template(mut self, template: SegmentTemplate) -> Self {
        self.registry.templates.insert(template.key.clone(), template);
        self
    }

    /// Registers or replaces the handler for a key
    pub fn handler(mut self, key: MessageKey, handler: impl MessageHandler + 'static) -> Self {
        self.registry.handlers.insert(key, Arc::new(handler));
        self
    }

    /// Registers a shared handler for a key
    pub fn shared_handler(mut self, key: MessageKey, handler: Arc<dyn MessageHandler>) -> Self {
        self.registry.handlers.insert(key, handler);
        self
    }

    /// Registers one shared handler for every key that has a template
    pub fn handler_for_templates(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        let keys: Vec<MessageKey> = self.registry.templates.keys().cloned().collect();
        for key in keys {
            self.registry.handlers.insert(key, Arc::clone(&handler));
        }
        self
    }

    pub fn build(self) -> MessageTypeRegistry {
        self.registry
    }
}
