//! HL7v2 to FHIR mapping
//!
//! A mapping either yields a complete resource or fails; a business field
//! that is present but unreadable is an error, never a silent `null`.

use super::resources::{
    Address, AdministrativeGender, CodeableConcept, Coding, ContactPoint, HumanName, Identifier,
    Observation, Patient, Quantity, Reference, ReferenceRange,
};
use crate::core::decoder::{finite_number, given_names, leaf_text, PidLayout};
use crate::domain::{Hl7Error, Hl7Result};
use crate::hl7::time::{hl7_date_to_iso, hl7_timestamp_to_iso};
use crate::hl7::{Field, Message, Segment};

/// Coding system URI for LOINC
pub const LOINC_SYSTEM: &str = "http://loinc.org";
/// Coding system URI for SNOMED CT
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";
/// Coding system URI for UCUM units
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";
/// Code system of OBX-8 abnormal flags
pub const INTERPRETATION_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";

/// FHIR system URI for an HL7 coding system name (CE.3)
pub fn coding_system_uri(hl7_system: &str) -> Option<String> {
    match hl7_system.trim() {
        "" => None,
        "LN" => Some(LOINC_SYSTEM.to_string()),
        "SCT" | "SNM" => Some(SNOMED_SYSTEM.to_string()),
        other => Some(other.to_string()),
    }
}

/// Maps segments to FHIR resources for one partner
#[derive(Debug, Clone, Copy, Default)]
pub struct FhirMapper {
    /// `None` detects the layout per PID segment
    layout: Option<PidLayout>,
}

impl FhirMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads PID fields at fixed positions instead of detecting them
    pub fn with_layout(layout: PidLayout) -> Self {
        Self {
            layout: Some(layout),
        }
    }

    fn layout_for(&self, pid: &Segment) -> PidLayout {
        self.layout.unwrap_or_else(|| PidLayout::detect(pid))
    }

    /// PID to `Patient`
    ///
    /// # Errors
    ///
    /// [`Hl7Error::SegmentNotFound`] without a PID segment,
    /// [`Hl7Error::FieldMapping`] for an empty identifier or invalid birth date.
    pub fn patient(&self, message: &Message) -> Hl7Result<Patient> {
        let pid = message
            .segment("PID")
            .ok_or_else(|| Hl7Error::SegmentNotFound("PID".to_string()))?;
        let layout = self.layout_for(pid);

        let id_field = layout.identifier();
        let identifier = pid.component(id_field, 1).trim();
        if identifier.is_empty() {
            return Err(Hl7Error::field(
                format!("PID-{id_field}"),
                "patient identifier is empty",
            ));
        }

        let birth_field = layout.birth_date();
        let raw_birth = pid.value(birth_field).trim();
        let birth_date = if raw_birth.is_empty() {
            None
        } else {
            Some(hl7_date_to_iso(raw_birth).ok_or_else(|| {
                Hl7Error::field(
                    format!("PID-{birth_field}"),
                    format!("'{raw_birth}' is not a valid date"),
                )
            })?)
        };

        Ok(Patient {
            id: Some(identifier.to_string()),
            identifier: vec![Identifier {
                system: text(pid.component(id_field, 4)),
                value: identifier.to_string(),
            }],
            name: human_name(pid, layout.name()).into_iter().collect(),
            telecom: text(pid.value(layout.phone()))
                .map(|value| ContactPoint {
                    system: Some("phone".to_string()),
                    value,
                })
                .into_iter()
                .collect(),
            gender: gender(pid.value(layout.sex())),
            birth_date,
            address: pid.field(layout.address()).and_then(address).into_iter().collect(),
        })
    }

    /// One `Observation` per OBX segment
    ///
    /// # Errors
    ///
    /// [`Hl7Error::SegmentNotFound`] when the message has no OBX segment,
    /// [`Hl7Error::FieldMapping`] for an empty OBX-3, a non-numeric `NM`
    /// value or an unreadable timestamp.
    pub fn observations(&self, message: &Message) -> Hl7Result<Vec<Observation>> {
        let subject = message.segment("PID").and_then(|pid| {
            let layout = self.layout_for(pid);
            text(pid.component(layout.identifier(), 1)).map(|id| Reference::patient(&id))
        });
        let fallback_time = message
            .segment("OBR")
            .map(|obr| timestamp(obr, 7))
            .transpose()?
            .flatten();

        let observations = message
            .segments_named("OBX")
            .enumerate()
            .map(|(index, obx)| {
                observation(obx, index + 1, message, subject.clone(), fallback_time.clone())
            })
            .collect::<Hl7Result<Vec<_>>>()?;

        if observations.is_empty() {
            return Err(Hl7Error::SegmentNotFound("OBX".to_string()));
        }
        Ok(observations)
    }
}

/// PID to `Patient`, detecting the PID layout
pub fn hl7_to_fhir_patient(message: &Message) -> Hl7Result<Patient> {
    FhirMapper::new().patient(message)
}

/// OBX segments to `Observation`s, detecting the PID layout
pub fn hl7_to_fhir_observations(message: &Message) -> Hl7Result<Vec<Observation>> {
    FhirMapper::new().observations(message)
}

// Non-M/F codes map to `unknown`, including `O`.
fn gender(code: &str) -> Option<AdministrativeGender> {
    match code.trim().to_ascii_uppercase().as_str() {
        "" => None,
        "M" => Some(AdministrativeGender::Male),
        "F" => Some(AdministrativeGender::Female),
        _ => Some(AdministrativeGender::Unknown),
    }
}

fn human_name(pid: &Segment, n: usize) -> Option<HumanName> {
    let family = text(pid.component(n, 1));
    let given = given_names(pid, n);
    if family.is_none() && given.is_empty() {
        return None;
    }
    Some(HumanName { family, given })
}

fn address(field: &Field) -> Option<Address> {
    let part = |n: usize| field.component(n).and_then(text);
    let address = Address {
        line: [part(1), part(2)].into_iter().flatten().collect(),
        city: part(3),
        state: part(4),
        postal_code: part(5),
        country: part(6),
    };
    let empty = address.line.is_empty()
        && address.city.is_none()
        && address.state.is_none()
        && address.postal_code.is_none()
        && address.country.is_none();
    (!empty).then_some(address)
}

fn observation(
    obx: &Segment,
    position: usize,
    message: &Message,
    subject: Option<Reference>,
    fallback_time: Option<String>,
) -> Hl7Result<Observation> {
    let label = |n: usize| format!("OBX({position})-{n}");

    let code = obx
        .field(3)
        .map(codeable_concept)
        .filter(|c| !c.coding.is_empty())
        .ok_or_else(|| Hl7Error::field(label(3), "observation identifier is empty"))?;

    let unit = obx.field(6).and_then(|f| f.component(1)).and_then(text);
    let unit_is_ucum = obx.component(6, 3) == "UCUM";
    let quantity = |value: f64| Quantity {
        value,
        unit: unit.clone(),
        system: unit_is_ucum.then(|| UCUM_SYSTEM.to_string()),
        code: if unit_is_ucum { unit.clone() } else { None },
    };

    let mut result = Observation {
        status: "final".to_string(),
        code,
        subject,
        effective_date_time: timestamp(obx, 14)?.or(fallback_time),
        ..Observation::default()
    };

    let value_type = obx.value(2).trim().to_ascii_uppercase();
    let value = obx.field(5).map(|f| leaf_text(f, message)).unwrap_or_default();
    let value = value.trim();
    if !value.is_empty() {
        match value_type.as_str() {
            "NM" => {
                let number = finite_number(value).ok_or_else(|| {
                    Hl7Error::field(label(5), format!("'{value}' is not numeric"))
                })?;
                result.value_quantity = Some(quantity(number));
            }
            "ID" if value.eq_ignore_ascii_case("Y") => result.value_boolean = Some(true),
            "ID" if value.eq_ignore_ascii_case("N") => result.value_boolean = Some(false),
            _ => result.value_string = Some(value.to_string()),
        }
    }

    if let Some(range) = text(obx.value(7)) {
        let (low, high) = parse_range(&range);
        result.reference_range.push(ReferenceRange {
            low: low.map(quantity),
            high: high.map(quantity),
            text: Some(range),
        });
    }

    if let Some(flag) = text(obx.value(8)) {
        result.interpretation.push(CodeableConcept {
            coding: vec![Coding {
                system: Some(INTERPRETATION_SYSTEM.to_string()),
                code: flag,
                display: None,
            }],
            text: None,
        });
    }

    Ok(result)
}

fn codeable_concept(field: &Field) -> CodeableConcept {
    let code = field.component(1).and_then(text);
    let display = field.component(2).and_then(text);
    CodeableConcept {
        coding: code
            .map(|code| Coding {
                system: field.component(3).and_then(coding_system_uri),
                code,
                display: display.clone(),
            })
            .into_iter()
            .collect(),
        text: display,
    }
}

/// `low-high` bounds of a reference range; other forms keep only the text
fn parse_range(range: &str) -> (Option<f64>, Option<f64>) {
    // skip a leading sign so "-5-5" splits at the second dash
    let split = range
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-')
        .map(|(i, _)| i);
    let Some(split) = split else {
        return (None, None);
    };
    let low = finite_number(&range[..split]);
    let high = finite_number(&range[split + 1..]);
    match (low, high) {
        (Some(low), Some(high)) => (Some(low), Some(high)),
        _ => (None, None),
    }
}

fn timestamp(segment: &Segment, n: usize) -> Hl7Result<Option<String>> {
    let raw = segment.value(n).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    hl7_timestamp_to_iso(raw).map(Some).ok_or_else(|| {
        Hl7Error::field(
            format!("{}-{n}", segment.name()),
            format!("'{raw}' is not a valid timestamp"),
        )
    })
}

fn text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
