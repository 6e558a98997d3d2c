//! Outbound message builder
//!
//! Produces wire text for a [`StructuredEvent`] by walking the segment
//! template registered for the event's type and trigger. Every required value
//! is checked before the first segment is assembled, so a build either
//! yields a complete message or fails without side effects.

use super::events::{
    Address, AdtPayload, CodedValue, EventPayload, Location, ObservationResult, OrderInfo,
    OrderPayload, PatientIdentity, PersonName, Provider, ResultPayload, Routing,
    StructuredEvent, VisitInfo,
};
use super::decoder::finite_number;
use super::registry::{MessageTypeRegistry, RegistryBuilder, SegmentKind, SegmentTemplate};
use crate::domain::{ControlId, Hl7Error, Hl7Result};
use crate::hl7::model::MSH;
use crate::hl7::time::{format_date, format_timestamp};
use crate::hl7::{encode, Component, EncodingChars, Field, Message, Repetition, Segment};
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;

/// Identifier type code written to PID-3.5
const MEDICAL_RECORD_NUMBER: &str = "MR";

/// Header defaults applied to every built message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub encoding: EncodingChars,
    /// MSH-11 when the event does not carry one
    pub processing_id: String,
    /// MSH-12
    pub version_id: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            encoding: EncodingChars::default(),
            processing_id: "P".to_string(),
            version_id: "2.5".to_string(),
        }
    }
}

/// Template-driven builder for outbound messages
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    registry: Arc<MessageTypeRegistry>,
    options: BuildOptions,
}

impl MessageBuilder {
    pub fn new(registry: Arc<MessageTypeRegistry>, options: BuildOptions) -> Self {
        Self { registry, options }
    }

    /// Builder over the five standard templates with default options
    pub fn standard() -> Self {
        Self::new(
            Arc::new(RegistryBuilder::new().with_standard_templates().build()),
            BuildOptions::default(),
        )
    }

    /// Same templates, different header defaults
    pub fn with_options(&self, options: BuildOptions) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Builds and serialises an event
    pub fn build(&self, event: &StructuredEvent) -> Hl7Result<String> {
        self.build_message(event).map(|message| encode(&message))
    }

    /// Builds an event into the message model
    ///
    /// # Errors
    ///
    /// [`Hl7Error::UnsupportedMessageType`] when no template is registered
    /// for the event, [`Hl7Error::FieldMapping`] when a required value is
    /// missing or malformed.
    pub fn build_message(&self, event: &StructuredEvent) -> Hl7Result<Message> {
        let key = event.key();
        let template = self
            .registry
            .template(&key)
            .ok_or_else(|| Hl7Error::UnsupportedMessageType(key.to_string()))?;

        validate(event)?;

        let control_id = event
            .control_id
            .clone()
            .unwrap_or_else(ControlId::generate);
        let timestamp = event
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());

        let mut segments = vec![self.header(event, template, &control_id, &timestamp)];
        for entry in &template.segments {
            populate(entry.kind, event, &timestamp, &mut segments);
        }

        Message::new(self.options.encoding, segments)
    }

    /// `ADT^A01`
    pub fn build_admission(&self, routing: &Routing, payload: AdtPayload) -> Hl7Result<String> {
        self.build(&StructuredEvent::new(
            routing.clone(),
            EventPayload::Admission(payload),
        ))
    }

    /// `ADT^A02`
    pub fn build_transfer(&self, routing: &Routing, payload: AdtPayload) -> Hl7Result<String> {
        self.build(&StructuredEvent::new(
            routing.clone(),
            EventPayload::Transfer(payload),
        ))
    }

    /// `ADT^A03`
    pub fn build_discharge(&self, routing: &Routing, payload: AdtPayload) -> Hl7Result<String> {
        self.build(&StructuredEvent::new(
            routing.clone(),
            EventPayload::Discharge(payload),
        ))
    }

    /// `ORM^O01`
    pub fn build_lab_order(&self, routing: &Routing, payload: OrderPayload) -> Hl7Result<String> {
        self.build(&StructuredEvent::new(
            routing.clone(),
            EventPayload::LabOrder(payload),
        ))
    }

    /// `ORU^R01`
    pub fn build_lab_result(
        &self,
        routing: &Routing,
        payload: ResultPayload,
    ) -> Hl7Result<String> {
        self.build(&StructuredEvent::new(
            routing.clone(),
            EventPayload::LabResult(payload),
        ))
    }

    fn header(
        &self,
        event: &StructuredEvent,
        template: &SegmentTemplate,
        control_id: &ControlId,
        timestamp: &NaiveDateTime,
    ) -> Segment {
        let key = &template.key;
        let processing_id = event
            .processing_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.options.processing_id);

        Segment::new(MSH)
            .with(3, event.routing.sending_application.as_str())
            .with(4, event.routing.sending_facility.as_str())
            .with(5, event.routing.receiving_application.as_str())
            .with(6, event.routing.receiving_facility.as_str())
            .with(7, format_timestamp(timestamp))
            .with(
                9,
                Field::components([
                    key.message_type(),
                    key.trigger_event(),
                    template.structure.as_str(),
                ]),
            )
            .with(10, control_id.as_str())
            .with(11, processing_id)
            .with(12, self.options.version_id.as_str())
    }
}

fn validate(event: &StructuredEvent) -> Hl7Result<()> {
    require(&event.routing.sending_application, "MSH-3", "sending application")?;
    require(&event.routing.receiving_application, "MSH-5", "receiving application")?;
    require(&event.patient().identifier, "PID-3", "patient identifier")?;

    match &event.payload {
        EventPayload::Admission(adt) | EventPayload::Discharge(adt) => require_name(&adt.patient),
        EventPayload::Transfer(adt) => {
            require_name(&adt.patient)?;
            if adt.visit.location.as_ref().map_or(true, location_is_empty) {
                return Err(Hl7Error::field("PV1-3", "transfer requires the new location"));
            }
            Ok(())
        }
        EventPayload::LabOrder(order) => {
            let placer = order.order.placer_order_number.as_deref().unwrap_or_default();
            require(placer, "ORC-2", "placer order number")?;
            require(&order.order.test.code, "OBR-4", "ordered test code")
        }
        EventPayload::LabResult(result) => {
            require(&result.order.test.code, "OBR-4", "test code")?;
            if result.observations.is_empty() {
                return Err(Hl7Error::field(
                    "OBX",
                    "lab result requires at least one observation",
                ));
            }
            for (index, obs) in result.observations.iter().enumerate() {
                let position = index + 1;
                require(&obs.value_type, &format!("OBX({position})-2"), "value type")?;
                require(&obs.code.code, &format!("OBX({position})-3"), "observation code")?;
                let is_numeric = finite_number(&obs.value).is_some();
                if obs.value_type.eq_ignore_ascii_case("NM") && !is_numeric {
                    return Err(Hl7Error::field(
                        format!("OBX({position})-5"),
                        format!("'{}' is not numeric", obs.value),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn require(value: &str, field: &str, what: &str) -> Hl7Result<()> {
    if value.trim().is_empty() {
        Err(Hl7Error::field(field, format!("{what} is required")))
    } else {
        Ok(())
    }
}

fn require_name(patient: &PatientIdentity) -> Hl7Result<()> {
    let family = patient.name.as_ref().map(|n| n.family.as_str()).unwrap_or_default();
    require(family, "PID-5", "patient family name")
}

fn location_is_empty(location: &Location) -> bool {
    location.point_of_care.is_none() && location.room.is_none() && location.bed.is_none()
}

fn populate(
    kind: SegmentKind,
    event: &StructuredEvent,
    timestamp: &NaiveDateTime,
    segments: &mut Vec<Segment>,
) {
    match (&event.payload, kind) {
        (_, SegmentKind::Evn) => segments.push(
            Segment::new("EVN")
                .with(1, event.key().trigger_event())
                .with(2, format_timestamp(timestamp)),
        ),
        (payload, SegmentKind::Pid) => segments.push(pid_segment(payload.patient())),
        (
            EventPayload::Admission(adt) | EventPayload::Transfer(adt) | EventPayload::Discharge(adt),
            SegmentKind::Pv1,
        ) => segments.push(pv1_segment(&adt.visit)),
        (EventPayload::LabOrder(order), SegmentKind::Orc) => {
            segments.push(orc_segment("NW", &order.order, timestamp))
        }
        (EventPayload::LabResult(result), SegmentKind::Orc) => {
            segments.push(orc_segment("RE", &result.order, timestamp))
        }
        (EventPayload::LabOrder(order), SegmentKind::Obr) => segments.push(obr_segment(&order.order)),
        (EventPayload::LabResult(result), SegmentKind::Obr) => {
            segments.push(obr_segment(&result.order))
        }
        (EventPayload::LabResult(result), SegmentKind::Obx) => {
            segments.extend(
                result
                    .observations
                    .iter()
                    .enumerate()
                    .map(|(index, obs)| obx_segment(index + 1, obs)),
            );
        }
        // the payload carries nothing for this segment
        _ => {}
    }
}

fn pid_segment(patient: &PatientIdentity) -> Segment {
    let identifier = match &patient.assigning_authority {
        Some(authority) => Field::components([
            patient.identifier.as_str(),
            "",
            "",
            authority.as_str(),
            MEDICAL_RECORD_NUMBER,
        ]),
        None => Field::from(patient.identifier.as_str()),
    };

    let mut pid = Segment::new("PID").with(1, "1").with(3, identifier);
    if let Some(name) = &patient.name {
        pid.set_field(5, name_field(name));
    }
    if let Some(birth_date) = &patient.birth_date {
        pid.set_field(7, format_date(birth_date));
    }
    if let Some(gender) = &patient.gender {
        pid.set_field(8, gender.code());
    }
    if let Some(address) = patient.address.as_ref().filter(|a| !a.is_empty()) {
        pid.set_field(11, address_field(address));
    }
    if let Some(phone) = &patient.phone {
        pid.set_field(13, phone.as_str());
    }
    pid
}

/// XPN: family, first given name, further given names as sub-components of XPN.3
fn name_field(name: &PersonName) -> Field {
    let first = name.given.first().cloned().unwrap_or_default();
    let mut components = vec![Component::new(name.family.as_str()), Component::new(first)];
    if let Some(further) = name.given.get(1..).filter(|further| !further.is_empty()) {
        components.push(Component {
            subcomponents: further.to_vec(),
        });
    }
    while components.len() > 1
        && components
            .last()
            .is_some_and(|c| c.subcomponents.iter().all(String::is_empty))
    {
        components.pop();
    }
    Field::Composite(vec![Repetition { components }]).normalized()
}

fn address_field(address: &Address) -> Field {
    let part = |value: &Option<String>| value.clone().unwrap_or_default();
    Field::components([
        part(&address.street),
        String::new(),
        part(&address.city),
        part(&address.state),
        part(&address.postal_code),
        part(&address.country),
    ])
}

fn location_field(location: &Location) -> Field {
    let part = |value: &Option<String>| value.clone().unwrap_or_default();
    Field::components([
        part(&location.point_of_care),
        part(&location.room),
        part(&location.bed),
    ])
}

fn provider_field(provider: &Provider) -> Field {
    Field::components([
        provider.id.as_deref().unwrap_or_default(),
        provider.name.as_str(),
    ])
}

fn coded_field(value: &CodedValue) -> Field {
    Field::components([
        value.code.as_str(),
        value.display.as_deref().unwrap_or_default(),
        value.system.as_deref().unwrap_or_default(),
    ])
}

fn pv1_segment(visit: &VisitInfo) -> Segment {
    let mut pv1 = Segment::new("PV1")
        .with(1, "1")
        .with(2, visit.patient_class.as_str());
    if let Some(location) = &visit.location {
        pv1.set_field(3, location_field(location));
    }
    if let Some(prior) = &visit.prior_location {
        pv1.set_field(6, location_field(prior));
    }
    if let Some(attending) = &visit.attending {
        pv1.set_field(7, provider_field(attending));
    }
    if let Some(visit_number) = &visit.visit_number {
        pv1.set_field(19, visit_number.as_str());
    }
    if let Some(disposition) = &visit.discharge_disposition {
        pv1.set_field(36, disposition.as_str());
    }
    if let Some(admitted_at) = &visit.admitted_at {
        pv1.set_field(44, format_timestamp(admitted_at));
    }
    if let Some(discharged_at) = &visit.discharged_at {
        pv1.set_field(45, format_timestamp(discharged_at));
    }
    pv1
}

fn orc_segment(control: &str, order: &OrderInfo, timestamp: &NaiveDateTime) -> Segment {
    let mut orc = Segment::new("ORC").with(1, control);
    if let Some(placer) = &order.placer_order_number {
        orc.set_field(2, placer.as_str());
    }
    if let Some(filler) = &order.filler_order_number {
        orc.set_field(3, filler.as_str());
    }
    orc.set_field(9, format_timestamp(timestamp));
    if let Some(provider) = &order.ordering_provider {
        orc.set_field(12, provider_field(provider));
    }
    orc
}

fn obr_segment(order: &OrderInfo) -> Segment {
    let mut obr = Segment::new("OBR").with(1, "1");
    if let Some(placer) = &order.placer_order_number {
        obr.set_field(2, placer.as_str());
    }
    if let Some(filler) = &order.filler_order_number {
        obr.set_field(3, filler.as_str());
    }
    obr.set_field(4, coded_field(&order.test));
    if let Some(observed_at) = &order.observed_at {
        obr.set_field(7, format_timestamp(observed_at));
    }
    if let Some(provider) = &order.ordering_provider {
        obr.set_field(16, provider_field(provider));
    }
    if let Some(status) = &order.result_status {
        obr.set_field(25, status.as_str());
    }
    obr
}

fn obx_segment(set_id: usize, obs: &ObservationResult) -> Segment {
    let mut obx = Segment::new("OBX")
        .with(1, set_id.to_string())
        .with(2, obs.value_type.as_str())
        .with(3, coded_field(&obs.code))
        .with(5, obs.value.as_str());
    if let Some(units) = &obs.units {
        obx.set_field(6, units.as_str());
    }
    if let Some(range) = &obs.reference_range {
        obx.set_field(7, range.as_str());
    }
    if let Some(flag) = &obs.abnormal_flag {
        obx.set_field(8, flag.as_str());
    }
    obx.set_field(11, obs.status.as_str());
    if let Some(observed_at) = &obs.observed_at {
        obx.set_field(14, format_timestamp(observed_at));
    }
    obx
}
