//! Integration tests for HL7v2 <-> FHIR mapping

use caduceus::core::decoder::PidLayout;
use caduceus::core::events::Routing;
use caduceus::domain::Hl7Error;
use caduceus::fhir::resources::{
    AdministrativeGender, CodeableConcept, Coding, HumanName, Identifier, Quantity, Reference,
};
use caduceus::fhir::{
    convert_fhir_to_hl7, convert_hl7_to_fhir, hl7_to_fhir_observations, hl7_to_fhir_patient,
    FhirInput, FhirMapper, FhirOutput, FhirResource, Observation, Patient,
};
use caduceus::hl7::parse;
use serde_json::json;

const HEADER: &str = "MSH|^~\\&|EHR|WARD|CADUCEUS|HOSP|20240301083000||";

fn message(kind: &str, body: &str) -> String {
    format!("{HEADER}{kind}|MSG00001|P|2.5\r{body}")
}

fn routing() -> Routing {
    Routing::new("CADUCEUS", "HOSP", "LIS", "LAB")
}

#[test]
fn test_patient_from_legacy_pid_layout() {
    let raw = message("ADT^A01", "PID|1|12345||Doe^John||19800101|M\r");
    let patient = hl7_to_fhir_patient(&parse(&raw).unwrap()).unwrap();

    assert_eq!(patient.identifier[0].value, "12345");
    assert_eq!(patient.name[0].family.as_deref(), Some("Doe"));
    assert_eq!(patient.name[0].given, vec!["John".to_string()]);
    assert_eq!(patient.birth_date.as_deref(), Some("1980-01-01"));
    assert_eq!(patient.gender, Some(AdministrativeGender::Male));
}

#[test]
fn test_patient_from_standard_pid_layout() {
    let raw = message(
        "ADT^A01",
        "PID|1||P001^^^HOSP^MR||Smith^Jane^Marie||19900512|F|||12 High St^Apt 4^Springfield^IL^62701^USA||555-0101\r",
    );
    let patient = hl7_to_fhir_patient(&parse(&raw).unwrap()).unwrap();

    assert_eq!(patient.id.as_deref(), Some("P001"));
    assert_eq!(
        patient.identifier,
        vec![Identifier {
            system: Some("HOSP".to_string()),
            value: "P001".to_string(),
        }]
    );
    assert_eq!(
        patient.name,
        vec![HumanName {
            family: Some("Smith".to_string()),
            given: vec!["Jane".to_string(), "Marie".to_string()],
        }]
    );
    assert_eq!(patient.gender, Some(AdministrativeGender::Female));
    assert_eq!(patient.telecom[0].value, "555-0101");

    let address = &patient.address[0];
    assert_eq!(address.line, vec!["12 High St", "Apt 4"]);
    assert_eq!(address.city.as_deref(), Some("Springfield"));
    assert_eq!(address.postal_code.as_deref(), Some("62701"));
}

#[test]
fn test_patient_json_shape() {
    let raw = message("ADT^A01", "PID|1|12345||Doe^John||19800101|M\r");
    let patient = hl7_to_fhir_patient(&parse(&raw).unwrap()).unwrap();
    let value = serde_json::to_value(FhirResource::from(patient)).unwrap();

    assert_eq!(value["resourceType"], "Patient");
    assert_eq!(value["identifier"][0]["value"], "12345");
    assert_eq!(value["name"][0]["given"], json!(["John"]));
    assert_eq!(value["birthDate"], "1980-01-01");
    assert_eq!(value["gender"], "male");
}

#[test]
fn test_other_sex_codes_map_to_unknown() {
    for code in ["O", "U", "A", "X"] {
        let raw = message("ADT^A01", &format!("PID|1||P001||Doe^Sam||19800101|{code}\r"));
        let patient = hl7_to_fhir_patient(&parse(&raw).unwrap()).unwrap();
        assert_eq!(patient.gender, Some(AdministrativeGender::Unknown), "code {code}");
    }
}

#[test]
fn test_forced_layout_overrides_detection() {
    // a standard partner that happens to send an empty PID-3
    let raw = message("ADT^A01", "PID|1|LEGACY-7||Doe^John||19800101|M\r");
    let message = parse(&raw).unwrap();

    assert_eq!(
        FhirMapper::with_layout(PidLayout::Standard).patient(&message),
        Err(Hl7Error::field("PID-3", "patient identifier is empty"))
    );
}

#[test]
fn test_invalid_birth_date_is_a_mapping_error() {
    let raw = message("ADT^A01", "PID|1||P001||Doe^John||19801345|M\r");
    let err = hl7_to_fhir_patient(&parse(&raw).unwrap()).unwrap_err();
    assert!(matches!(err, Hl7Error::FieldMapping { ref field, .. } if field == "PID-7"));
}

#[test]
fn test_observations_from_result_message() {
    let raw = message(
        "ORU^R01",
        "PID|1||P001||Smith^Jane\r\
         OBR|1|PLC-1||24323-8^Metabolic panel^LN|||20240301080000\r\
         OBX|1|NM|2345-7^Glucose^LN||98|mg/dL^^UCUM|70-99|N|||F|||20240301081500\r\
         OBX|2|ST|8251-1^Comment^LN||fasting sample||||||F\r\
         OBX|3|ID|HEMOLYZED^Hemolyzed^L||N||||||F\r",
    );
    let observations = hl7_to_fhir_observations(&parse(&raw).unwrap()).unwrap();
    assert_eq!(observations.len(), 3);

    let glucose = &observations[0];
    assert_eq!(glucose.status, "final");
    assert_eq!(
        glucose.code.first_coding(),
        Some(&Coding {
            system: Some("http://loinc.org".to_string()),
            code: "2345-7".to_string(),
            display: Some("Glucose".to_string()),
        })
    );
    assert_eq!(glucose.subject, Some(Reference::patient("P001")));
    assert_eq!(glucose.effective_date_time.as_deref(), Some("2024-03-01T08:15:00"));
    assert_eq!(
        glucose.value_quantity,
        Some(Quantity {
            value: 98.0,
            unit: Some("mg/dL".to_string()),
            system: Some("http://unitsofmeasure.org".to_string()),
            code: Some("mg/dL".to_string()),
        })
    );
    let range = &glucose.reference_range[0];
    assert_eq!(range.low.as_ref().map(|q| q.value), Some(70.0));
    assert_eq!(range.high.as_ref().map(|q| q.value), Some(99.0));
    assert_eq!(range.text.as_deref(), Some("70-99"));
    assert_eq!(glucose.interpretation[0].coding[0].code, "N");

    let comment = &observations[1];
    assert_eq!(comment.value_string.as_deref(), Some("fasting sample"));
    // falls back to OBR-7
    assert_eq!(comment.effective_date_time.as_deref(), Some("2024-03-01T08:00:00"));

    assert_eq!(observations[2].value_boolean, Some(false));
}

#[test]
fn test_non_numeric_nm_value_fails() {
    let raw = message(
        "ORU^R01",
        "PID|1||P001\rOBR|1\rOBX|1|NM|2345-7^Glucose^LN||high||||||F\r",
    );
    assert_eq!(
        hl7_to_fhir_observations(&parse(&raw).unwrap()),
        Err(Hl7Error::field("OBX(1)-5", "'high' is not numeric"))
    );
}

#[test]
fn test_result_without_obx_fails() {
    let raw = message("ORU^R01", "PID|1||P001\rOBR|1\r");
    assert_eq!(
        hl7_to_fhir_observations(&parse(&raw).unwrap()),
        Err(Hl7Error::SegmentNotFound("OBX".to_string()))
    );
}

#[test]
fn test_convert_checks_declared_type() {
    let raw = message("ADT^A01", "PID|1||P001||Smith^Jane\r");

    assert!(matches!(
        convert_hl7_to_fhir(&raw, "ADT").unwrap(),
        FhirOutput::Single(FhirResource::Patient(_))
    ));
    assert!(convert_hl7_to_fhir(&raw, "ADT^A01").is_ok());
    assert_eq!(
        convert_hl7_to_fhir(&raw, "ORU"),
        Err(Hl7Error::MessageTypeMismatch {
            expected: "ORU".to_string(),
            actual: "ADT^A01".to_string(),
        })
    );
    assert!(matches!(
        convert_hl7_to_fhir(&raw, "ADT^A03"),
        Err(Hl7Error::MessageTypeMismatch { .. })
    ));
}

#[test]
fn test_convert_orm_has_no_fhir_mapping() {
    let raw = message("ORM^O01", "PID|1||P001\rORC|NW|PLC-1\rOBR|1|PLC-1||CBC\r");
    assert_eq!(
        convert_hl7_to_fhir(&raw, "ORM"),
        Err(Hl7Error::UnsupportedMessageType("ORM^O01".to_string()))
    );
}

#[test]
fn test_convert_result_to_array() {
    let raw = message(
        "ORU^R01",
        "PID|1||P001\rOBR|1|||2345-7^Glucose^LN\rOBX|1|NM|2345-7^Glucose^LN||98|mg/dL|70-99|N|||F\r",
    );
    let output = convert_hl7_to_fhir(&raw, "ORU").unwrap();
    let value = serde_json::to_value(&output).unwrap();

    assert!(value.is_array());
    assert_eq!(value[0]["resourceType"], "Observation");
    assert_eq!(value[0]["valueQuantity"]["value"], 98.0);
    assert_eq!(value[0]["subject"]["reference"], "Patient/P001");
}

fn fhir_patient() -> Patient {
    Patient {
        id: Some("P001".to_string()),
        identifier: vec![Identifier {
            system: None,
            value: "P001".to_string(),
        }],
        name: vec![HumanName {
            family: Some("Smith".to_string()),
            given: vec!["Jane".to_string()],
        }],
        gender: Some(AdministrativeGender::Female),
        birth_date: Some("1990-05-12".to_string()),
        ..Patient::default()
    }
}

#[test]
fn test_patient_to_admission() {
    let raw = convert_fhir_to_hl7(FhirResource::from(fhir_patient()).into(), "ADT", &routing())
        .unwrap();
    let message = parse(&raw).unwrap();

    assert_eq!(message.message_type(), "ADT");
    assert_eq!(message.trigger_event(), "A01");
    let pid = message.segment("PID").unwrap();
    assert_eq!(pid.value(3), "P001");
    assert_eq!(pid.component(5, 1), "Smith");
    assert_eq!(pid.component(5, 2), "Jane");
    assert_eq!(pid.value(7), "19900512");
    assert_eq!(pid.value(8), "F");
    assert!(message.segment("PV1").is_some());

    // and back again
    let patient = hl7_to_fhir_patient(&message).unwrap();
    assert_eq!(patient.identifier[0].value, "P001");
    assert_eq!(patient.birth_date.as_deref(), Some("1990-05-12"));
    assert_eq!(patient.gender, Some(AdministrativeGender::Female));
}

#[test]
fn test_patient_to_adt_from_json() {
    let input: FhirInput = serde_json::from_value(json!({
        "resourceType": "Patient",
        "identifier": [{"value": "P002"}],
        "name": [{"family": "Nguyen", "given": ["An"]}],
        "gender": "male",
        "birthDate": "1975-11-30",
        "extension": [{"url": "ignored"}]
    }))
    .unwrap();

    let raw = convert_fhir_to_hl7(input, "ADT^A03", &routing()).unwrap();
    let message = parse(&raw).unwrap();
    assert_eq!(message.trigger_event(), "A03");
    assert_eq!(message.segment("PID").unwrap().value(8), "M");
}

#[test]
fn test_partial_birth_date_is_rejected() {
    let mut patient = fhir_patient();
    patient.birth_date = Some("1990-05".to_string());

    let err = convert_fhir_to_hl7(FhirResource::from(patient).into(), "ADT", &routing())
        .unwrap_err();
    assert!(matches!(err, Hl7Error::FieldMapping { ref field, .. } if field == "Patient.birthDate"));
}

#[test]
fn test_patient_without_identifier_is_rejected() {
    let patient = Patient {
        name: vec![HumanName {
            family: Some("Smith".to_string()),
            given: vec![],
        }],
        ..Patient::default()
    };
    let err = convert_fhir_to_hl7(FhirResource::from(patient).into(), "ADT", &routing())
        .unwrap_err();
    assert!(matches!(err, Hl7Error::FieldMapping { ref field, .. } if field == "Patient.identifier"));
}

#[test]
fn test_adt_needs_exactly_one_patient() {
    let input = FhirInput::Many(vec![
        FhirResource::from(fhir_patient()),
        FhirResource::from(fhir_patient()),
    ]);
    assert!(matches!(
        convert_fhir_to_hl7(input, "ADT", &routing()),
        Err(Hl7Error::FieldMapping { .. })
    ));
}

fn glucose() -> Observation {
    Observation {
        status: "final".to_string(),
        code: CodeableConcept {
            coding: vec![Coding {
                system: Some("http://loinc.org".to_string()),
                code: "2345-7".to_string(),
                display: Some("Glucose".to_string()),
            }],
            text: None,
        },
        subject: Some(Reference::patient("P001")),
        effective_date_time: Some("2024-03-01T08:15:00".to_string()),
        value_quantity: Some(Quantity {
            value: 98.0,
            unit: Some("mg/dL".to_string()),
            system: None,
            code: None,
        }),
        ..Observation::default()
    }
}

#[test]
fn test_observations_to_result_message() {
    let mut comment = glucose();
    comment.code.coding[0].code = "8251-1".to_string();
    comment.value_quantity = None;
    comment.value_string = Some("fasting sample".to_string());

    let input = FhirInput::Many(vec![glucose().into(), comment.into()]);
    let raw = convert_fhir_to_hl7(input, "ORU", &routing()).unwrap();
    let message = parse(&raw).unwrap();

    assert_eq!(message.message_type(), "ORU");
    assert_eq!(message.segment("PID").unwrap().value(3), "P001");

    let obr = message.segment("OBR").unwrap();
    assert_eq!(obr.component(4, 1), "2345-7");
    assert_eq!(obr.value(25), "F");

    let obx: Vec<_> = message.segments_named("OBX").collect();
    assert_eq!(obx.len(), 2);
    assert_eq!(obx[0].value(2), "NM");
    assert_eq!(obx[0].component(3, 3), "LN");
    assert_eq!(obx[0].value(5), "98");
    assert_eq!(obx[0].value(6), "mg/dL");
    assert_eq!(obx[0].value(14), "20240301081500");
    assert_eq!(obx[1].value(2), "ST");
    assert_eq!(obx[1].value(5), "fasting sample");
}

#[test]
fn test_observation_without_subject_or_patient_fails() {
    let mut observation = glucose();
    observation.subject = None;

    let err = convert_fhir_to_hl7(FhirResource::from(observation).into(), "ORU", &routing())
        .unwrap_err();
    assert!(matches!(err, Hl7Error::FieldMapping { ref field, .. } if field == "PID-3"));
}

#[test]
fn test_unsupported_target_type() {
    assert!(matches!(
        convert_fhir_to_hl7(FhirResource::from(fhir_patient()).into(), "ORM", &routing()),
        Err(Hl7Error::UnsupportedMessageType(_))
    ));
}
