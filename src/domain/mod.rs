//! Domain types for Caduceus.
//!
//! This module contains the error hierarchy, the crate-wide [`Result`] alias and
//! the strongly-typed identifiers shared by every layer.
//!
//! # Overview
//!
//! - **Identifiers** ([`ControlId`], [`MessageKey`])
//! - **Error types** ([`CaduceusError`], [`Hl7Error`], [`TransportError`])
//! - **Result type aliases** ([`Result`], [`Hl7Result`])
//!
//! # Error Handling
//!
//! Codec, dispatch and mapping functions return [`Hl7Result`]; everything that
//! touches configuration or I/O returns [`Result`]. The `?` operator lifts one
//! into the other:
//!
//! ```rust
//! use caduceus::domain::Result;
//! use caduceus::hl7::parse;
//!
//! fn control_id_of(raw: &str) -> Result<String> {
//!     let message = parse(raw)?;
//!     Ok(message.control_id().to_string())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{CaduceusError, Hl7Error, TransportError};
pub use ids::{ControlId, MessageKey};
pub use result::{Hl7Result, Result};
