//! Structured clinical events
//!
//! Business-level descriptions of the outbound messages the engine can build.
//! A [`StructuredEvent`] is what the builder consumes and what the event
//! decoder produces, and it is also the JSON shape accepted by `caduceus send`.

use crate::domain::{ControlId, MessageKey};
use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Sending and receiving application and facility (MSH-3 to MSH-6)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Routing {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
}

impl Routing {
    pub fn new(
        sending_application: impl Into<String>,
        sending_facility: impl Into<String>,
        receiving_application: impl Into<String>,
        receiving_facility: impl Into<String>,
    ) -> Self {
        Self {
            sending_application: sending_application.into(),
            sending_facility: sending_facility.into(),
            receiving_application: receiving_application.into(),
            receiving_facility: receiving_facility.into(),
        }
    }
}

/// A complete outbound event: routing header plus typed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredEvent {
    #[serde(flatten)]
    pub routing: Routing,

    /// Generated on build when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<ControlId>,

    /// MSH-7; the current local time when absent
    ///
    /// HL7 timestamps carry whole seconds. Sub-second parts are not sent, so
    /// set this through [`StructuredEvent::with_timestamp`] when the event
    /// must equal its decoded form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,

    /// MSH-11; the builder default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_id: Option<String>,

    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StructuredEvent {
    /// Event with generated control ID and timestamp
    pub fn new(routing: Routing, payload: EventPayload) -> Self {
        Self {
            routing,
            control_id: None,
            timestamp: None,
            processing_id: None,
            payload,
        }
    }

    /// Sets MSH-7, truncated to the whole second
    pub fn with_timestamp(mut self, at: NaiveDateTime) -> Self {
        self.timestamp = Some(at.trunc_subsecs(0));
        self
    }

    /// Message type and trigger event this event is built as
    pub fn key(&self) -> MessageKey {
        self.payload.key()
    }

    /// Patient the event is about
    pub fn patient(&self) -> &PatientIdentity {
        self.payload.patient()
    }
}

/// Type-specific event content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    /// `ADT^A01`
    Admission(AdtPayload),
    /// `ADT^A02`
    Transfer(AdtPayload),
    /// `ADT^A03`
    Discharge(AdtPayload),
    /// `ORM^O01`
    LabOrder(OrderPayload),
    /// `ORU^R01`
    LabResult(ResultPayload),
}

impl EventPayload {
    pub fn key(&self) -> MessageKey {
        match self {
            EventPayload::Admission(_) => MessageKey::ADT_A01,
            EventPayload::Transfer(_) => MessageKey::ADT_A02,
            EventPayload::Discharge(_) => MessageKey::ADT_A03,
            EventPayload::LabOrder(_) => MessageKey::ORM_O01,
            EventPayload::LabResult(_) => MessageKey::ORU_R01,
        }
    }

    pub fn patient(&self) -> &PatientIdentity {
        match self {
            EventPayload::Admission(p) | EventPayload::Transfer(p) | EventPayload::Discharge(p) => {
                &p.patient
            }
            EventPayload::LabOrder(p) => &p.patient,
            EventPayload::LabResult(p) => &p.patient,
        }
    }
}

/// Admission, transfer and discharge content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdtPayload {
    pub patient: PatientIdentity,
    #[serde(default)]
    pub visit: VisitInfo,
}

/// Lab order content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub patient: PatientIdentity,
    pub order: OrderInfo,
}

/// Lab result content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub patient: PatientIdentity,
    pub order: OrderInfo,
    pub observations: Vec<ObservationResult>,
}

/// Patient identification (PID)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatientIdentity {
    /// PID-3.1
    pub identifier: String,
    /// PID-3.4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigning_authority: Option<String>,
    /// PID-5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<PersonName>,
    /// PID-7
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    /// PID-8
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<AdministrativeSex>,
    /// PID-11
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// PID-13
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Person name (XPN): family, first given, further given names
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonName {
    pub family: String,
    #[serde(default)]
    pub given: Vec<String>,
}

impl PersonName {
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            given: vec![given.into()],
        }
    }

    /// "Given Family" display form
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = self.given.iter().map(String::as_str).collect();
        parts.push(&self.family);
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

/// Postal address (XAD)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

/// HL7 table 0001 administrative sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeSex {
    Male,
    Female,
    Other,
    Unknown,
}

impl AdministrativeSex {
    /// PID-8 code
    pub fn code(&self) -> &'static str {
        match self {
            AdministrativeSex::Male => "M",
            AdministrativeSex::Female => "F",
            AdministrativeSex::Other => "O",
            AdministrativeSex::Unknown => "U",
        }
    }

    /// Reads a PID-8 code; `None` for an empty value
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "" => None,
            "M" => Some(AdministrativeSex::Male),
            "F" => Some(AdministrativeSex::Female),
            "O" => Some(AdministrativeSex::Other),
            _ => Some(AdministrativeSex::Unknown),
        }
    }
}

/// Visit details (PV1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitInfo {
    /// PV1-2; `I` inpatient, `O` outpatient, `E` emergency
    #[serde(default = "default_patient_class")]
    pub patient_class: String,
    /// PV1-3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// PV1-6
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_location: Option<Location>,
    /// PV1-7
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attending: Option<Provider>,
    /// PV1-19
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_number: Option<String>,
    /// PV1-36
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_disposition: Option<String>,
    /// PV1-44
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admitted_at: Option<NaiveDateTime>,
    /// PV1-45
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharged_at: Option<NaiveDateTime>,
}

fn default_patient_class() -> String {
    "I".to_string()
}

impl Default for VisitInfo {
    fn default() -> Self {
        Self {
            patient_class: default_patient_class(),
            location: None,
            prior_location: None,
            attending: None,
            visit_number: None,
            discharge_disposition: None,
            admitted_at: None,
            discharged_at: None,
        }
    }
}

/// Patient location (PL): point of care, room, bed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_of_care: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed: Option<String>,
}

impl Location {
    pub fn room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            ..Self::default()
        }
    }
}

/// Clinician (XCN): optional identifier plus a display name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl Provider {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Coded element (CE): code, display text, coding system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl CodedValue {
    pub fn new(code: impl Into<String>, display: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display: Some(display.into()),
            system: Some(system.into()),
        }
    }
}

/// Order details (ORC/OBR)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderInfo {
    /// ORC-2 / OBR-2; required for lab orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placer_order_number: Option<String>,
    /// ORC-3 / OBR-3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filler_order_number: Option<String>,
    /// OBR-4
    pub test: CodedValue,
    /// ORC-12 / OBR-16
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_provider: Option<Provider>,
    /// OBR-7
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<NaiveDateTime>,
    /// OBR-25, results only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_status: Option<String>,
}

/// One OBX result line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationResult {
    /// OBX-2, e.g. `NM`, `ST`, `ID`
    pub value_type: String,
    /// OBX-3
    pub code: CodedValue,
    /// OBX-5
    pub value: String,
    /// OBX-6
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// OBX-7
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    /// OBX-8
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abnormal_flag: Option<String>,
    /// OBX-11
    #[serde(default = "default_result_status")]
    pub status: String,
    /// OBX-14
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<NaiveDateTime>,
}

fn default_result_status() -> String {
    "F".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_timestamp_drops_subseconds() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 15, 250)
            .unwrap();
        let event = StructuredEvent::new(
            Routing::default(),
            EventPayload::Admission(AdtPayload {
                patient: PatientIdentity::default(),
                visit: VisitInfo::default(),
            }),
        )
        .with_timestamp(at);
        assert_eq!(
            event.timestamp.map(|t| t.to_string()).as_deref(),
            Some("2024-03-01 08:30:15")
        );
    }

    #[test]
    fn test_payload_keys() {
        let adt = AdtPayload {
            patient: PatientIdentity::default(),
            visit: VisitInfo::default(),
        };
        assert_eq!(EventPayload::Admission(adt.clone()).key(), MessageKey::ADT_A01);
        assert_eq!(EventPayload::Transfer(adt.clone()).key(), MessageKey::ADT_A02);
        assert_eq!(EventPayload::Discharge(adt).key(), MessageKey::ADT_A03);
    }

    #[test]
    fn test_event_from_json() {
        let event: StructuredEvent = serde_json::from_value(json!({
            "sending_application": "CADUCEUS",
            "sending_facility": "CITY",
            "receiving_application": "EHR",
            "receiving_facility": "NORTH",
            "event": "admission",
            "patient": {
                "identifier": "P001",
                "name": { "family": "Smith", "given": ["Jane"] },
                "birth_date": "1990-05-12",
                "gender": "female"
            },
            "visit": { "location": { "room": "204" }, "attending": { "name": "Dr. Lee" } }
        }))
        .unwrap();

        assert_eq!(event.key(), MessageKey::ADT_A01);
        assert_eq!(event.patient().gender, Some(AdministrativeSex::Female));
        let EventPayload::Admission(adt) = &event.payload else {
            panic!("expected admission");
        };
        assert_eq!(adt.visit.patient_class, "I");
        assert_eq!(adt.visit.location, Some(Location::room("204")));
    }

    #[test]
    fn test_sex_codes() {
        assert_eq!(AdministrativeSex::from_code("m"), Some(AdministrativeSex::Male));
        assert_eq!(AdministrativeSex::from_code("O"), Some(AdministrativeSex::Other));
        assert_eq!(AdministrativeSex::from_code("A"), Some(AdministrativeSex::Unknown));
        assert_eq!(AdministrativeSex::from_code(""), None);
        assert_eq!(AdministrativeSex::Female.code(), "F");
    }

    #[test]
    fn test_full_name() {
        let name = PersonName {
            family: "Smith".into(),
            given: vec!["Jane".into(), "Ann".into()],
        };
        assert_eq!(name.full_name(), "Jane Ann Smith");
    }
}
