//! External system integrations for Caduceus.
//!
//! This module provides adapters for the systems the engine talks to:
//!
//! - [`transport`] - partner delivery over MLLP/TCP or HTTP, plus the inbound listener
//! - [`audit`] - one-way audit trail of every exchange
//!
//! # Design Pattern
//!
//! Adapters sit behind traits ([`transport::Transport`], [`audit::AuditSink`]) so the
//! engine can be exercised with in-memory implementations.
//!
//! # Transport Adapter
//!
//! ```rust,no_run
//! use caduceus::adapters::transport::transport_for;
//! use caduceus::config::PartnerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let partner = PartnerConfig {
//!     name: "lab".to_string(),
//!     endpoint: "tcp://lab.example.org:2575".to_string(),
//!     ..PartnerConfig::default()
//! };
//!
//! let transport = transport_for(&partner)?;
//! let reply = transport.send("MSH|^~\\&|...", &partner.endpoint).await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod transport;
