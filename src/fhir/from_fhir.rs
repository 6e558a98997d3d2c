//! FHIR to HL7v2 mapping
//!
//! Resources are mapped into the structured event model and built through
//! [`MessageBuilder`], so outbound validation is the same as for any other
//! event.

use super::resources::{
    AdministrativeGender, CodeableConcept, Observation, Patient, Quantity, ReferenceRange,
};
use super::to_fhir::{LOINC_SYSTEM, SNOMED_SYSTEM};
use crate::core::builder::MessageBuilder;
use crate::core::events::{
    Address, AdministrativeSex, AdtPayload, CodedValue, EventPayload, ObservationResult,
    OrderInfo, PatientIdentity, PersonName, ResultPayload, Routing, StructuredEvent, VisitInfo,
};
use crate::domain::{Hl7Error, Hl7Result, MessageKey};
use crate::hl7::time::parse_iso_datetime;
use chrono::{NaiveDate, NaiveDateTime};

/// HL7 coding system name (CE.3) for a FHIR system URI
pub fn hl7_coding_system(uri: &str) -> String {
    match uri.trim() {
        LOINC_SYSTEM => "LN".to_string(),
        SNOMED_SYSTEM => "SCT".to_string(),
        other => other.to_string(),
    }
}

/// `Patient` to an `ADT^A01`, `ADT^A02` or `ADT^A03` message
///
/// The visit is left at its defaults, so an `A02` built from a bare patient
/// fails for lack of a location. Use [`patient_identity`] with a filled
/// [`AdtPayload`] when visit details are known.
pub fn fhir_patient_to_adt(
    patient: &Patient,
    key: &MessageKey,
    routing: &Routing,
    builder: &MessageBuilder,
) -> Hl7Result<String> {
    let payload = AdtPayload {
        patient: patient_identity(patient)?,
        visit: VisitInfo::default(),
    };
    let payload = match (key.message_type(), key.trigger_event()) {
        ("ADT", "A01") => EventPayload::Admission(payload),
        ("ADT", "A02") => EventPayload::Transfer(payload),
        ("ADT", "A03") => EventPayload::Discharge(payload),
        _ => return Err(Hl7Error::UnsupportedMessageType(key.to_string())),
    };
    builder.build(&StructuredEvent::new(routing.clone(), payload))
}

/// `Observation`s to one `ORU^R01` message
///
/// The patient comes from `patient` when given, otherwise from the first
/// observation's `subject`. OBR-4 repeats the first observation's code.
pub fn fhir_observation_to_oru(
    observations: &[Observation],
    patient: Option<&Patient>,
    routing: &Routing,
    builder: &MessageBuilder,
) -> Hl7Result<String> {
    let first = observations
        .first()
        .ok_or_else(|| Hl7Error::field("OBX", "at least one Observation is required"))?;

    let patient = match patient {
        Some(patient) => patient_identity(patient)?,
        None => {
            let identifier = first
                .subject
                .as_ref()
                .and_then(|subject| subject.patient_id())
                .ok_or_else(|| {
                    Hl7Error::field("PID-3", "Observation.subject does not reference a Patient")
                })?;
            PatientIdentity {
                identifier: identifier.to_string(),
                ..PatientIdentity::default()
            }
        }
    };

    let results = observations
        .iter()
        .enumerate()
        .map(|(index, observation)| observation_result(observation, index + 1))
        .collect::<Hl7Result<Vec<_>>>()?;

    let order = OrderInfo {
        test: coded_value(&first.code, "OBR-4")?,
        observed_at: results.first().and_then(|r| r.observed_at),
        result_status: Some(result_status(&first.status).to_string()),
        ..OrderInfo::default()
    };

    builder.build_lab_result(
        routing,
        ResultPayload {
            patient,
            order,
            observations: results,
        },
    )
}

/// Patient identity in the event model
///
/// # Errors
///
/// [`Hl7Error::FieldMapping`] without an identifier, or when `birthDate`
/// is not a complete `YYYY-MM-DD` date.
pub fn patient_identity(patient: &Patient) -> Hl7Result<PatientIdentity> {
    let identifier = patient
        .identifier
        .iter()
        .find(|id| !id.value.trim().is_empty());
    let (identifier, assigning_authority) = match identifier {
        Some(id) => (id.value.trim().to_string(), id.system.clone()),
        None => match patient.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => (id.to_string(), None),
            None => {
                return Err(Hl7Error::field(
                    "Patient.identifier",
                    "patient identifier is required",
                ))
            }
        },
    };

    let birth_date = patient
        .birth_date
        .as_deref()
        .map(|value| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                Hl7Error::field(
                    "Patient.birthDate",
                    format!("'{value}' is not a complete date"),
                )
            })
        })
        .transpose()?;

    Ok(PatientIdentity {
        identifier,
        assigning_authority,
        name: patient.name.first().map(|name| PersonName {
            family: name.family.clone().unwrap_or_default(),
            given: name.given.clone(),
        }),
        birth_date,
        gender: patient.gender.map(|gender| match gender {
            AdministrativeGender::Male => AdministrativeSex::Male,
            AdministrativeGender::Female => AdministrativeSex::Female,
            AdministrativeGender::Other => AdministrativeSex::Other,
            AdministrativeGender::Unknown => AdministrativeSex::Unknown,
        }),
        address: patient
            .address
            .first()
            .map(|address| Address {
                street: address.line.first().cloned(),
                city: address.city.clone(),
                state: address.state.clone(),
                postal_code: address.postal_code.clone(),
                country: address.country.clone(),
            })
            .filter(|address| !address.is_empty()),
        phone: patient
            .telecom
            .iter()
            .find(|t| t.system.as_deref().map_or(true, |s| s == "phone"))
            .map(|t| t.value.clone()),
    })
}

fn observation_result(observation: &Observation, position: usize) -> Hl7Result<ObservationResult> {
    let label = |n: usize| format!("OBX({position})-{n}");

    let (value_type, value, units) = if let Some(quantity) = &observation.value_quantity {
        ("NM", quantity.value.to_string(), quantity.unit.clone())
    } else if let Some(text) = &observation.value_string {
        ("ST", text.clone(), None)
    } else if let Some(flag) = observation.value_boolean {
        ("ID", if flag { "Y" } else { "N" }.to_string(), None)
    } else {
        return Err(Hl7Error::field(label(5), "Observation has no value"));
    };

    let observed_at = observation
        .effective_date_time
        .as_deref()
        .map(|value| parse_effective(value, &label(14)))
        .transpose()?;

    Ok(ObservationResult {
        value_type: value_type.to_string(),
        code: coded_value(&observation.code, &label(3))?,
        value,
        units,
        reference_range: observation.reference_range.first().and_then(range_text),
        abnormal_flag: observation
            .interpretation
            .iter()
            .find_map(CodeableConcept::first_coding)
            .map(|coding| coding.code.clone()),
        status: result_status(&observation.status).to_string(),
        observed_at,
    })
}

fn coded_value(concept: &CodeableConcept, field: &str) -> Hl7Result<CodedValue> {
    let coding = concept
        .first_coding()
        .filter(|coding| !coding.code.trim().is_empty())
        .ok_or_else(|| Hl7Error::field(field, "code is required"))?;
    Ok(CodedValue {
        code: coding.code.clone(),
        display: coding.display.clone().or_else(|| concept.text.clone()),
        system: coding.system.as_deref().map(hl7_coding_system),
    })
}

/// `text` when present, otherwise `low-high`
fn range_text(range: &ReferenceRange) -> Option<String> {
    if let Some(text) = range.text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(text.to_string());
    }
    let bound = |q: &Option<Quantity>| q.as_ref().map(|q| q.value.to_string());
    match (bound(&range.low), bound(&range.high)) {
        (Some(low), Some(high)) => Some(format!("{low}-{high}")),
        (Some(low), None) => Some(format!(">={low}")),
        (None, Some(high)) => Some(format!("<={high}")),
        (None, None) => None,
    }
}

/// HL7 table 0085 code for an Observation status
fn result_status(status: &str) -> &'static str {
    match status.trim() {
        "preliminary" | "registered" => "P",
        "corrected" | "amended" => "C",
        "cancelled" | "entered-in-error" => "X",
        _ => "F",
    }
}

fn parse_effective(value: &str, field: &str) -> Hl7Result<NaiveDateTime> {
    parse_iso_datetime(value)
        .ok_or_else(|| Hl7Error::field(field, format!("'{value}' is not a valid date-time")))
}
