// Caduceus - HL7v2 Message Engine
// Copyright (c) 2025 Caduceus Contributors
// Licensed under the MIT License

//! # Caduceus - HL7v2 Message Engine
//!
//! Caduceus parses, builds, acknowledges and routes HL7v2 messages, and maps
//! their patient and result content to and from FHIR resources.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Parsing** pipe-delimited messages into a segment/field model
//! - **Building** ADT, ORM and ORU messages from typed clinical events
//! - **Acknowledging** every inbound message with exactly one `AA`, `AE` or `AR`
//! - **Dispatching** messages to business handlers by type and trigger event
//! - **Mapping** PID and OBX segments to FHIR `Patient` and `Observation`
//!
//! ## Architecture
//!
//! Caduceus follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`hl7`] - Wire codec, message model and acknowledgments
//! - [`core`] - Events, registry, dispatcher, builder and intake
//! - [`fhir`] - FHIR resources and conversions
//! - [`adapters`] - Transports (MLLP, HTTP) and audit sinks
//! - [`domain`] - Error taxonomy and identifier types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust
//! use caduceus::hl7::{encode, generate_ack, parse, AckCode};
//!
//! let raw = "MSH|^~\\&|EHR|WARD|ERP|HOSP|20240101120000||ADT^A01|MSG00001|P|2.5\r\
//!            PID|1||P001||Smith^Jane||19900512|F\r";
//! let message = parse(raw).unwrap();
//! assert_eq!(message.control_id(), "MSG00001");
//!
//! let ack = generate_ack(&message, AckCode::ApplicationAccept, None);
//! assert!(encode(&ack).contains("MSA|AA|MSG00001"));
//! ```
//!
//! ## Building Messages
//!
//! ```rust
//! use caduceus::core::builder::MessageBuilder;
//! use caduceus::core::events::{AdtPayload, PatientIdentity, PersonName, Routing, VisitInfo};
//!
//! let builder = MessageBuilder::standard();
//! let raw = builder
//!     .build_admission(
//!         &Routing::new("CADUCEUS", "HOSP", "EHR", "WARD"),
//!         AdtPayload {
//!             patient: PatientIdentity {
//!                 identifier: "P001".to_string(),
//!                 name: Some(PersonName::new("Smith", "Jane")),
//!                 ..PatientIdentity::default()
//!             },
//!             visit: VisitInfo::default(),
//!         },
//!     )
//!     .unwrap();
//! assert!(raw.starts_with("MSH|^~\\&|CADUCEUS|HOSP|EHR|WARD|"));
//! ```
//!
//! ## Error Handling
//!
//! Caduceus uses the [`domain::CaduceusError`] type for all errors. HL7
//! failures are [`domain::Hl7Error`] values, each of which knows the
//! acknowledgment code it earns:
//!
//! ```rust
//! use caduceus::domain::Hl7Error;
//! use caduceus::hl7::AckCode;
//!
//! let err = Hl7Error::MalformedMessage("message is empty".to_string());
//! assert_eq!(err.ack_code(), AckCode::ApplicationReject);
//! ```
//!
//! ## Logging
//!
//! Caduceus uses structured logging with the `tracing` crate. Message payloads
//! are never logged:
//!
//! ```rust,no_run
//! use caduceus::log_ack_generated;
//! use caduceus::hl7::AckCode;
//!
//! log_ack_generated!(AckCode::ApplicationAccept, "MSG00001");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod fhir;
pub mod hl7;
pub mod logging;
