//! Core engine logic for Caduceus.
//!
//! # Modules
//!
//! - [`events`] - Structured clinical events and their payloads
//! - [`registry`] - Message type registry: segment templates and inbound handlers
//! - [`dispatcher`] - Routing of parsed messages to handlers, with acknowledgment
//! - [`builder`] - Template-driven construction of outbound messages
//! - [`decoder`] - Parsed messages back into structured events
//! - [`intake`] - Inbound boundary: raw text in, one acknowledgment out
//! - [`client`] - Outbound sends with acknowledgment correlation
//! - [`status`] - Engine health report
//!
//! # Inbound Workflow
//!
//! 1. **Receive**: a transport hands raw text to [`intake::IntakeService`]
//! 2. **Parse**: failure yields an `AR` reject
//! 3. **Dispatch**: the registered handler runs under a deadline
//! 4. **Acknowledge**: `AA` on success, `AE` on any handler or routing failure
//! 5. **Audit**: one entry per message, payload stored as a digest only
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus::adapters::audit::TracingAuditSink;
//! use caduceus::core::dispatcher::Dispatcher;
//! use caduceus::core::intake::IntakeService;
//! use caduceus::core::registry::{AcceptingHandler, RegistryBuilder};
//! use caduceus::domain::MessageKey;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = RegistryBuilder::new()
//!     .with_standard_templates()
//!     .handler(MessageKey::ADT_A01, AcceptingHandler)
//!     .build();
//!
//! let intake = IntakeService::new(Dispatcher::new(Arc::new(registry)), Arc::new(TracingAuditSink));
//! let outcome = intake.receive("MSH|^~\\&|EHR|WARD|ERP|HOSP|||ADT^A01|MSG1|P|2.5\r").await;
//! println!("{}", outcome.ack_text);
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod decoder;
pub mod dispatcher;
pub mod events;
pub mod intake;
pub mod registry;
pub mod status;
