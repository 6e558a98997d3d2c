//! Event decoder
//!
//! Reads a parsed message back into a [`StructuredEvent`], reversing the
//! builder for the five supported layouts. For an event whose header values
//! are all set, `decode_event(&parse(&build(&event)?)?)` returns the event
//! unchanged.

use super::events::{
    Address, AdministrativeSex, AdtPayload, CodedValue, EventPayload, Location,
    ObservationResult, OrderInfo, OrderPayload, PatientIdentity, PersonName, Provider,
    ResultPayload, Routing, StructuredEvent, VisitInfo,
};
use super::registry::SegmentTemplate;
use crate::domain::{ControlId, Hl7Error, Hl7Result, MessageKey};
use crate::hl7::encoder::encode_field;
use crate::hl7::time::{parse_date, parse_timestamp};
use crate::hl7::{Field, Message, Segment};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Where a partner places the PID fields
///
/// Some partners send PID values one position early (identifier in PID-2,
/// name in PID-4 and so on). Outbound messages always use `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PidLayout {
    #[default]
    Standard,
    Shifted,
}

impl PidLayout {
    pub fn identifier(&self) -> usize {
        self.position(3)
    }

    pub fn name(&self) -> usize {
        self.position(5)
    }

    pub fn birth_date(&self) -> usize {
        self.position(7)
    }

    pub fn sex(&self) -> usize {
        self.position(8)
    }

    pub fn address(&self) -> usize {
        self.position(11)
    }

    pub fn phone(&self) -> usize {
        self.position(13)
    }

    /// Layout a PID segment appears to use
    ///
    /// `Shifted` only when PID-3 is empty and PID-2 carries a value.
    pub fn detect(pid: &Segment) -> Self {
        if pid.value(3).trim().is_empty() && !pid.value(2).trim().is_empty() {
            PidLayout::Shifted
        } else {
            PidLayout::Standard
        }
    }

    fn position(&self, standard: usize) -> usize {
        match self {
            PidLayout::Standard => standard,
            PidLayout::Shifted => standard - 1,
        }
    }
}

impl std::str::FromStr for PidLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(PidLayout::Standard),
            "shifted" => Ok(PidLayout::Shifted),
            _ => Err(format!(
                "Invalid PID layout '{s}'. Must be one of: standard, shifted"
            )),
        }
    }
}

/// Decodes a message built from one of the standard templates
///
/// # Errors
///
/// [`Hl7Error::UnsupportedMessageType`] for message types without a standard
/// template, [`Hl7Error::SegmentNotFound`] when a required segment is absent,
/// [`Hl7Error::FieldMapping`] when a required value is empty or malformed.
pub fn decode_event(message: &Message) -> Hl7Result<StructuredEvent> {
    let key = message.key().ok_or_else(|| {
        Hl7Error::UnsupportedMessageType(format!(
            "{}^{}",
            message.message_type(),
            message.trigger_event()
        ))
    })?;
    let template = SegmentTemplate::standard()
        .into_iter()
        .find(|t| t.key == key)
        .ok_or_else(|| Hl7Error::UnsupportedMessageType(key.to_string()))?;

    for entry in template.segments.iter().filter(|s| s.required) {
        let name = entry.kind.segment_name();
        if message.segment(name).is_none() {
            return Err(Hl7Error::SegmentNotFound(name.to_string()));
        }
    }

    let pid = required_segment(message, "PID")?;
    let patient = decode_patient(pid, PidLayout::Standard)?;
    let payload = decode_payload(message, &key, patient)?;

    Ok(StructuredEvent {
        routing: Routing::new(
            message.sending_application(),
            message.sending_facility(),
            message.receiving_application(),
            message.receiving_facility(),
        ),
        control_id: ControlId::new(message.control_id()).ok(),
        timestamp: optional_timestamp(message.msh(), 7, "MSH-7")?,
        processing_id: non_empty(message.processing_id()),
        payload,
    })
}

fn decode_payload(
    message: &Message,
    key: &MessageKey,
    patient: PatientIdentity,
) -> Hl7Result<EventPayload> {
    if *key == MessageKey::ORM_O01 {
        return Ok(EventPayload::LabOrder(OrderPayload {
            patient,
            order: decode_order(message)?,
        }));
    }
    if *key == MessageKey::ORU_R01 {
        let observations = message
            .segments_named("OBX")
            .enumerate()
            .map(|(index, obx)| decode_observation(obx, index + 1, message))
            .collect::<Hl7Result<Vec<_>>>()?;
        return Ok(EventPayload::LabResult(ResultPayload {
            patient,
            order: decode_order(message)?,
            observations,
        }));
    }

    let adt = AdtPayload {
        patient,
        visit: decode_visit(required_segment(message, "PV1")?)?,
    };
    if *key == MessageKey::ADT_A01 {
        Ok(EventPayload::Admission(adt))
    } else if *key == MessageKey::ADT_A02 {
        Ok(EventPayload::Transfer(adt))
    } else if *key == MessageKey::ADT_A03 {
        Ok(EventPayload::Discharge(adt))
    } else {
        Err(Hl7Error::UnsupportedMessageType(key.to_string()))
    }
}

/// Reads patient identity from a PID segment
///
/// The identifier is required; dates that are present must be valid.
pub fn decode_patient(pid: &Segment, layout: PidLayout) -> Hl7Result<PatientIdentity> {
    let id_field = layout.identifier();
    let identifier = pid.component(id_field, 1);
    if identifier.trim().is_empty() {
        return Err(Hl7Error::field(
            format!("PID-{id_field}"),
            "patient identifier is empty",
        ));
    }

    let name_field = layout.name();
    let family = pid.component(name_field, 1);
    let given = given_names(pid, name_field);
    let name = if family.is_empty() && given.is_empty() {
        None
    } else {
        Some(PersonName {
            family: family.to_string(),
            given,
        })
    };

    Ok(PatientIdentity {
        identifier: identifier.to_string(),
        assigning_authority: non_empty(pid.component(id_field, 4)),
        name,
        birth_date: optional_date(pid, layout.birth_date())?,
        gender: AdministrativeSex::from_code(pid.value(layout.sex())),
        address: pid.field(layout.address()).and_then(decode_address),
        phone: non_empty(pid.value(layout.phone())),
    })
}

fn decode_address(field: &Field) -> Option<Address> {
    let part = |n: usize| field.component(n).and_then(non_empty);
    let address = Address {
        street: part(1),
        city: part(3),
        state: part(4),
        postal_code: part(5),
        country: part(6),
    };
    (!address.is_empty()).then_some(address)
}

fn decode_visit(pv1: &Segment) -> Hl7Result<VisitInfo> {
    Ok(VisitInfo {
        patient_class: pv1.value(2).to_string(),
        location: pv1.field(3).and_then(decode_location),
        prior_location: pv1.field(6).and_then(decode_location),
        attending: pv1.field(7).and_then(decode_provider),
        visit_number: non_empty(pv1.value(19)),
        discharge_disposition: non_empty(pv1.value(36)),
        admitted_at: optional_timestamp(pv1, 44, "PV1-44")?,
        discharged_at: optional_timestamp(pv1, 45, "PV1-45")?,
    })
}

fn decode_location(field: &Field) -> Option<Location> {
    let part = |n: usize| field.component(n).and_then(non_empty);
    let location = Location {
        point_of_care: part(1),
        room: part(2),
        bed: part(3),
    };
    (location.point_of_care.is_some() || location.room.is_some() || location.bed.is_some())
        .then_some(location)
}

/// First given name (XPN.2) followed by the non-empty sub-components of XPN.3
pub(crate) fn given_names(pid: &Segment, n: usize) -> Vec<String> {
    let Some(field) = pid.field(n) else {
        return Vec::new();
    };
    let mut given: Vec<String> = non_empty(pid.component(n, 2)).into_iter().collect();
    given.extend(
        (1..)
            .map_while(|sub| field.subcomponent(1, 3, sub))
            .filter_map(non_empty),
    );
    given
}

/// Reads an XCN value: identifier, then family and given name
pub fn decode_provider(field: &Field) -> Option<Provider> {
    let id = field.component(1).and_then(non_empty);
    let family = field.component(2).unwrap_or_default();
    let given = field.component(3).unwrap_or_default();
    let name = match (given.is_empty(), family.is_empty()) {
        (true, _) => family.to_string(),
        (false, true) => given.to_string(),
        (false, false) => format!("{given} {family}"),
    };
    if id.is_none() && name.is_empty() {
        return None;
    }
    Some(Provider { id, name })
}

/// Reads a CE value
pub fn decode_coded(field: &Field) -> CodedValue {
    CodedValue {
        code: field.component(1).unwrap_or_default().to_string(),
        display: field.component(2).and_then(non_empty),
        system: field.component(3).and_then(non_empty),
    }
}

fn decode_order(message: &Message) -> Hl7Result<OrderInfo> {
    let obr = required_segment(message, "OBR")?;
    let orc = message.segment("ORC");
    let from_either = |orc_field: usize, obr_field: usize| {
        orc.map(|s| s.value(orc_field))
            .and_then(non_empty)
            .or_else(|| non_empty(obr.value(obr_field)))
    };

    let test = obr.field(4).map(decode_coded).unwrap_or_default();
    if test.code.is_empty() {
        return Err(Hl7Error::field("OBR-4", "test code is empty"));
    }

    Ok(OrderInfo {
        placer_order_number: from_either(2, 2),
        filler_order_number: from_either(3, 3),
        test,
        ordering_provider: orc
            .and_then(|s| s.field(12))
            .and_then(decode_provider)
            .or_else(|| obr.field(16).and_then(decode_provider)),
        observed_at: optional_timestamp(obr, 7, "OBR-7")?,
        result_status: non_empty(obr.value(25)),
    })
}

fn decode_observation(
    obx: &Segment,
    position: usize,
    message: &Message,
) -> Hl7Result<ObservationResult> {
    let code = obx.field(3).map(decode_coded).unwrap_or_default();
    if code.code.is_empty() {
        return Err(Hl7Error::field(
            format!("OBX({position})-3"),
            "observation code is empty",
        ));
    }

    Ok(ObservationResult {
        value_type: obx.value(2).to_string(),
        code,
        value: obx
            .field(5)
            .map(|f| leaf_text(f, message))
            .unwrap_or_default(),
        units: obx.field(6).and_then(|f| f.component(1)).and_then(non_empty),
        reference_range: non_empty(obx.value(7)),
        abnormal_flag: non_empty(obx.value(8)),
        status: obx.value(11).to_string(),
        observed_at: optional_timestamp(obx, 14, &format!("OBX({position})-14"))?,
    })
}

/// Scalar text of a field; composite values keep their wire form
pub(crate) fn leaf_text(field: &Field, message: &Message) -> String {
    match field {
        Field::Scalar(value) => value.clone(),
        Field::Composite(_) => encode_field(field, message.encoding()),
    }
}

/// An NM value: a finite decimal number
///
/// `NaN` and the infinities parse as `f64` but have no JSON representation.
pub(crate) fn finite_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn required_segment<'a>(message: &'a Message, name: &str) -> Hl7Result<&'a Segment> {
    message
        .segment(name)
        .ok_or_else(|| Hl7Error::SegmentNotFound(name.to_string()))
}

fn optional_date(segment: &Segment, n: usize) -> Hl7Result<Option<NaiveDate>> {
    let raw = segment.value(n);
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_date(raw).map(Some).ok_or_else(|| {
        Hl7Error::field(
            format!("{}-{n}", segment.name()),
            format!("'{raw}' is not a valid date"),
        )
    })
}

fn optional_timestamp(
    segment: &Segment,
    n: usize,
    label: &str,
) -> Hl7Result<Option<NaiveDateTime>> {
    let raw = segment.value(n);
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| Hl7Error::field(label, format!("'{raw}' is not a valid timestamp")))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hl7::parse;

    #[test]
    fn test_decode_inbound_admission() {
        let pv1 = format!(
            "PV1|1|I|ICU^204^B||||1234^Lee^Anna{}V100{}20240305080000",
            "|".repeat(12),
            "|".repeat(25)
        );
        let raw = format!(
            "MSH|^~\\&|ADT1|GOOD HEALTH|EHR|CITY|20240305083000||ADT^A01^ADT_A01|MSG1|P|2.5\r\
EVN|A01|20240305083000\r\
PID|1||P001^^^HOSP^MR||Smith^Jane^Ann&Lou||19900512|F|||12 Main St^^Springfield^IL^62701^USA||555-0100\r\
{pv1}\r"
        );
        let event = decode_event(&parse(&raw).unwrap()).unwrap();

        assert_eq!(event.routing.sending_application, "ADT1");
        assert_eq!(event.control_id.as_ref().map(ControlId::as_str), Some("MSG1"));
        assert_eq!(event.timestamp.map(|t| t.to_string()).as_deref(), Some("2024-03-05 08:30:00"));

        let EventPayload::Admission(adt) = event.payload else {
            panic!("expected admission");
        };
        let patient = adt.patient;
        assert_eq!(patient.identifier, "P001");
        assert_eq!(patient.assigning_authority.as_deref(), Some("HOSP"));
        let name = patient.name.unwrap();
        assert_eq!(name.family, "Smith");
        assert_eq!(name.given, ["Jane", "Ann", "Lou"]);
        assert_eq!(patient.gender, Some(AdministrativeSex::Female));
        assert_eq!(patient.address.unwrap().city.as_deref(), Some("Springfield"));
        assert_eq!(patient.phone.as_deref(), Some("555-0100"));

        let visit = adt.visit;
        let location = visit.location.unwrap();
        assert_eq!(location.room.as_deref(), Some("204"));
        assert_eq!(location.bed.as_deref(), Some("B"));
        let attending = visit.attending.unwrap();
        assert_eq!(attending.id.as_deref(), Some("1234"));
        assert_eq!(attending.name, "Anna Lee");
        assert_eq!(visit.visit_number.as_deref(), Some("V100"));
        assert!(visit.admitted_at.is_some());
    }

    #[test]
    fn test_missing_required_segment() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.5\rPID|1||P1||Doe^John\r";
        let err = decode_event(&parse(raw).unwrap()).unwrap_err();
        assert_eq!(err, Hl7Error::SegmentNotFound("PV1".into()));
    }

    #[test]
    fn test_invalid_birth_date_is_reported() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.5\rPID|1||P1||Doe^John||1980-01-01\rPV1|1|I\r";
        let err = decode_event(&parse(raw).unwrap()).unwrap_err();
        assert!(matches!(err, Hl7Error::FieldMapping { ref field, .. } if field == "PID-7"));
    }

    #[test]
    fn test_unsupported_key() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101||ADT^A08|1|P|2.5\rPID|1||P1\r";
        let err = decode_event(&parse(raw).unwrap()).unwrap_err();
        assert_eq!(err, Hl7Error::UnsupportedMessageType("ADT^A08".into()));
    }

    #[test]
    fn test_shifted_layout() {
        let raw = "MSH|^~\\&|A|B\rPID|1|12345||Doe^John||19800101|M\r";
        let message = parse(raw).unwrap();
        let pid = message.segment("PID").unwrap();

        let patient = decode_patient(pid, PidLayout::Shifted).unwrap();
        assert_eq!(patient.identifier, "12345");
        assert_eq!(patient.name.unwrap().given, ["John"]);
        assert_eq!(patient.birth_date, NaiveDate::from_ymd_opt(1980, 1, 1));
        assert_eq!(patient.gender, Some(AdministrativeSex::Male));

        // standard positions are empty for this partner
        assert!(decode_patient(pid, PidLayout::Standard).is_err());
        assert_eq!(PidLayout::detect(pid), PidLayout::Shifted);
    }

    #[test]
    fn test_detect_prefers_standard() {
        let message = parse("MSH|^~\\&|A|B\rPID|1|OLD-ID|P001||Smith^Jane\r").unwrap();
        let pid = message.segment("PID").unwrap();
        assert_eq!(PidLayout::detect(pid), PidLayout::Standard);
    }

    #[test]
    fn test_pid_layout_parse() {
        assert_eq!("Shifted".parse::<PidLayout>().unwrap(), PidLayout::Shifted);
        assert!("diagonal".parse::<PidLayout>().is_err());
        assert_eq!(PidLayout::Shifted.phone(), 12);
    }

    #[test]
    fn test_composite_observation_value_keeps_wire_form() {
        let raw = "MSH|^~\\&|LAB|B|C|D|20240101||ORU^R01|1|P|2.5\rPID|1||P1\rOBR|1|||88141^Cytology^LN\rOBX|1|CE|88141^Result^LN||NEG^Negative^L||||||F\r";
        let event = decode_event(&parse(raw).unwrap()).unwrap();
        let EventPayload::LabResult(result) = event.payload else {
            panic!("expected lab result");
        };
        assert_eq!(result.observations[0].value, "NEG^Negative^L");
        assert_eq!(result.observations[0].status, "F");
    }
}
