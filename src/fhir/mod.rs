//! FHIR mapping
//!
//! Bidirectional mapping between HL7v2 segments and the FHIR `Patient` and
//! `Observation` resources.
//!
//! - [`resources`] - FHIR R4 records with JSON serialization
//! - [`to_fhir`] - PID and OBX to resources
//! - [`from_fhir`] - resources to `ADT` and `ORU` messages through the builder
//! - [`convert`] - raw text and JSON entry points
//!
//! # Example
//!
//! ```rust
//! use caduceus::fhir::{convert_hl7_to_fhir, FhirOutput, FhirResource};
//!
//! let raw = "MSH|^~\\&|EHR|WARD|ERP|HOSP|||ADT^A01|1|P|2.5\rPID|1|12345||Doe^John||19800101|M\r";
//! let output = convert_hl7_to_fhir(raw, "ADT").unwrap();
//! if let FhirOutput::Single(FhirResource::Patient(patient)) = output {
//!     assert_eq!(patient.birth_date.as_deref(), Some("1980-01-01"));
//! }
//! ```

pub mod convert;
pub mod from_fhir;
pub mod resources;
pub mod to_fhir;

pub use convert::{convert_fhir_to_hl7, convert_hl7_to_fhir, FhirConverter, FhirInput, FhirOutput};
pub use from_fhir::{fhir_observation_to_oru, fhir_patient_to_adt, patient_identity};
pub use resources::{FhirResource, Observation, Patient};
pub use to_fhir::{hl7_to_fhir_observations, hl7_to_fhir_patient, FhirMapper};
