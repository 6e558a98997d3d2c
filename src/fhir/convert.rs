//! Conversion entry points
//!
//! `ADT` messages convert to a single `Patient`, `ORU` messages to the list
//! of their `Observation`s. The reverse direction accepts the same shapes.

use super::from_fhir::{fhir_observation_to_oru, fhir_patient_to_adt};
use super::resources::{FhirResource, Observation, Patient};
use super::to_fhir::FhirMapper;
use crate::core::builder::MessageBuilder;
use crate::core::events::Routing;
use crate::domain::{Hl7Error, Hl7Result, MessageKey};
use crate::hl7::parse;
use serde::{Deserialize, Serialize};

/// Result of an HL7 to FHIR conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FhirOutput {
    Many(Vec<FhirResource>),
    Single(FhirResource),
}

impl FhirOutput {
    pub fn resources(&self) -> Vec<&FhirResource> {
        match self {
            FhirOutput::Single(resource) => vec![resource],
            FhirOutput::Many(resources) => resources.iter().collect(),
        }
    }
}

/// FHIR JSON handed to [`convert_fhir_to_hl7`]: one resource or an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FhirInput {
    Many(Vec<FhirResource>),
    Single(FhirResource),
}

impl FhirInput {
    fn into_resources(self) -> Vec<FhirResource> {
        match self {
            FhirInput::Single(resource) => vec![resource],
            FhirInput::Many(resources) => resources,
        }
    }
}

impl From<FhirResource> for FhirInput {
    fn from(resource: FhirResource) -> Self {
        FhirInput::Single(resource)
    }
}

/// Both conversion directions with one partner's mapping settings
#[derive(Debug, Clone)]
pub struct FhirConverter {
    mapper: FhirMapper,
    builder: MessageBuilder,
}

impl Default for FhirConverter {
    fn default() -> Self {
        Self::new(FhirMapper::new(), MessageBuilder::standard())
    }
}

impl FhirConverter {
    pub fn new(mapper: FhirMapper, builder: MessageBuilder) -> Self {
        Self { mapper, builder }
    }

    /// Parses `raw` and maps it to FHIR
    ///
    /// `message_type` is either a bare type (`ADT`) or a full key
    /// (`ADT^A01`); the message must declare it.
    ///
    /// # Errors
    ///
    /// Parse failures, [`Hl7Error::MessageTypeMismatch`] when the message
    /// declares another type, [`Hl7Error::UnsupportedMessageType`] for types
    /// without a FHIR mapping, and any mapping failure.
    pub fn to_fhir(&self, raw: &str, message_type: &str) -> Hl7Result<FhirOutput> {
        let message = parse(raw)?;
        let (expected_type, expected_trigger) = split_type(message_type);

        let actual = format!("{}^{}", message.message_type(), message.trigger_event());
        let type_matches = message.message_type().eq_ignore_ascii_case(expected_type);
        let trigger_matches = expected_trigger
            .map_or(true, |trigger| message.trigger_event().eq_ignore_ascii_case(trigger));
        if !type_matches || !trigger_matches {
            return Err(Hl7Error::MessageTypeMismatch {
                expected: message_type.trim().to_string(),
                actual,
            });
        }

        match expected_type.to_ascii_uppercase().as_str() {
            "ADT" => Ok(FhirOutput::Single(self.mapper.patient(&message)?.into())),
            "ORU" => Ok(FhirOutput::Many(
                self.mapper
                    .observations(&message)?
                    .into_iter()
                    .map(FhirResource::from)
                    .collect(),
            )),
            _ => Err(Hl7Error::UnsupportedMessageType(actual)),
        }
    }

    /// Builds an HL7 message from FHIR resources
    ///
    /// `ADT` (defaulting to `A01`) takes one `Patient`. `ORU` takes one or
    /// more `Observation`s and optionally the `Patient` they belong to.
    pub fn to_hl7(&self, input: FhirInput, message_type: &str, routing: &Routing) -> Hl7Result<String> {
        let (expected_type, trigger) = split_type(message_type);
        let resources = input.into_resources();

        let mut patients: Vec<Patient> = Vec::new();
        let mut observations: Vec<Observation> = Vec::new();
        for resource in resources {
            match resource {
                FhirResource::Patient(patient) => patients.push(patient),
                FhirResource::Observation(observation) => observations.push(observation),
            }
        }

        match expected_type.to_ascii_uppercase().as_str() {
            "ADT" => {
                let key = MessageKey::new("ADT", trigger.unwrap_or("A01").to_ascii_uppercase());
                let [patient] = patients.as_slice() else {
                    return Err(Hl7Error::field(
                        "Patient",
                        format!("ADT conversion takes exactly one Patient, got {}", patients.len()),
                    ));
                };
                if !observations.is_empty() {
                    return Err(Hl7Error::field("Patient", "ADT conversion does not take Observations"));
                }
                fhir_patient_to_adt(patient, &key, routing, &self.builder)
            }
            "ORU" => {
                if trigger.is_some_and(|t| !t.eq_ignore_ascii_case("R01")) {
                    return Err(Hl7Error::UnsupportedMessageType(message_type.trim().to_string()));
                }
                if patients.len() > 1 {
                    return Err(Hl7Error::field("Patient", "ORU conversion takes at most one Patient"));
                }
                fhir_observation_to_oru(&observations, patients.first(), routing, &self.builder)
            }
            _ => Err(Hl7Error::UnsupportedMessageType(message_type.trim().to_string())),
        }
    }
}

/// HL7 text to FHIR with layout detection and default settings
pub fn convert_hl7_to_fhir(raw: &str, message_type: &str) -> Hl7Result<FhirOutput> {
    FhirConverter::default().to_fhir(raw, message_type)
}

/// FHIR resources to HL7 text with the standard templates
pub fn convert_fhir_to_hl7(input: FhirInput, message_type: &str, routing: &Routing) -> Hl7Result<String> {
    FhirConverter::default().to_hl7(input, message_type, routing)
}

fn split_type(message_type: &str) -> (&str, Option<&str>) {
    let message_type = message_type.trim();
    match message_type.split_once('^') {
        Some((kind, trigger)) => {
            // ignore a trailing structure component such as ADT^A01^ADT_A01
            let trigger = trigger.split('^').next().unwrap_or_default();
            (kind, Some(trigger).filter(|t| !t.is_empty()))
        }
        None => (message_type, None),
    }
}
