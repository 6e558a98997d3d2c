//! Integration tests for acknowledgment generation

use caduceus::domain::Hl7Error;
use caduceus::hl7::ack::{ack_code_of, ack_text, acknowledged_control_id};
use caduceus::hl7::{encode, generate_ack, generate_error_ack, generate_reject, parse, AckCode};
use test_case::test_case;

const ORDER: &str = "MSH|^~\\&|EHR|WARD|CADUCEUS|HOSP|20240301083000||ORM^O01^ORM_O01|ORD-7731|T|2.5.1\r\
                     PID|1||P001||Smith^Jane\r\
                     ORC|NW|PLC-1\r\
                     OBR|1|PLC-1||CBC^Complete blood count^L\r";

#[test_case(AckCode::ApplicationAccept ; "accept")]
#[test_case(AckCode::ApplicationError ; "error")]
#[test_case(AckCode::ApplicationReject ; "reject")]
fn test_ack_correlates_to_control_id(code: AckCode) {
    let original = parse(ORDER).unwrap();
    let ack = generate_ack(&original, code, Some("detail"));

    assert_eq!(ack.message_type(), "ACK");
    assert_eq!(ack_code_of(&ack), Some(code));
    assert_eq!(acknowledged_control_id(&ack), Some("ORD-7731"));
    assert_ne!(ack.control_id(), "ORD-7731");
}

#[test]
fn test_ack_swaps_sender_and_receiver() {
    let original = parse(ORDER).unwrap();
    let ack = generate_ack(&original, AckCode::ApplicationAccept, None);

    assert_eq!(ack.sending_application(), "CADUCEUS");
    assert_eq!(ack.sending_facility(), "HOSP");
    assert_eq!(ack.receiving_application(), "EHR");
    assert_eq!(ack.receiving_facility(), "WARD");
    assert_eq!(ack.trigger_event(), "O01");
    assert_eq!(ack.processing_id(), "T");
    assert_eq!(ack.version_id(), "2.5.1");
}

#[test]
fn test_accept_has_no_error_segment() {
    let original = parse(ORDER).unwrap();
    let ack = generate_ack(&original, AckCode::ApplicationAccept, None);

    assert!(ack.segment("ERR").is_none());
    assert_eq!(ack_text(&ack), None);
    assert!(encode(&ack).contains("\rMSA|AA|ORD-7731\r"));
}

#[test]
fn test_error_ack_carries_detail() {
    let original = parse(ORDER).unwrap();
    let error = Hl7Error::field("ORC-2", "placer order number is required");
    let ack = generate_error_ack(&original, &error);

    assert_eq!(ack_code_of(&ack), Some(AckCode::ApplicationError));
    let text = ack_text(&ack).unwrap();
    assert!(text.contains("ORC-2"));

    let err = ack.segment("ERR").unwrap();
    assert_eq!(err.component(3, 1), "101");
    assert_eq!(err.component(3, 3), "HL70357");
    assert_eq!(err.value(4), "E");
    assert_eq!(err.value(8), text);
}

#[test]
fn test_non_accept_without_detail_gets_generic_text() {
    let original = parse(ORDER).unwrap();
    let ack = generate_ack(&original, AckCode::ApplicationError, Some("  "));
    assert!(!ack_text(&ack).unwrap().is_empty());
}

#[test]
fn test_unsupported_type_earns_application_error() {
    let original = parse(ORDER).unwrap();
    let error = Hl7Error::UnsupportedMessageType("ORM^O01".to_string());
    let ack = generate_error_ack(&original, &error);

    assert_eq!(ack_code_of(&ack), Some(AckCode::ApplicationError));
    assert_eq!(ack.segment("ERR").unwrap().component(3, 1), "200");
}

#[test]
fn test_reject_salvages_header_of_unparseable_text() {
    // the OBX line has no valid segment type, so the message fails to parse
    let raw = "MSH|^~\\&|EHR|WARD|CADUCEUS|HOSP|20240301083000||ORU^R01|RES-42|P|2.5\r1BX|bad\r";
    let error = parse(raw).unwrap_err();
    let ack = generate_reject(raw, &error);

    assert_eq!(ack_code_of(&ack), Some(AckCode::ApplicationReject));
    assert_eq!(acknowledged_control_id(&ack), Some("RES-42"));
    assert_eq!(ack.receiving_application(), "EHR");
    assert_eq!(ack.trigger_event(), "R01");
}

#[test]
fn test_reject_of_garbage_still_yields_a_message() {
    let error = parse("").unwrap_err();
    let ack = generate_reject("", &error);

    assert_eq!(ack_code_of(&ack), Some(AckCode::ApplicationReject));
    assert_eq!(acknowledged_control_id(&ack), None);
    assert!(ack_text(&ack).unwrap().contains("empty"));

    // the reject is itself a well-formed message
    let reparsed = parse(&encode(&ack)).unwrap();
    assert_eq!(reparsed.message_type(), "ACK");
}

#[test]
fn test_ack_uses_original_delimiters() {
    let raw = "MSH#*+!@#EHR#WARD#CADUCEUS#HOSP#20240101##ADT*A01#MSG9#P#2.5\r";
    let ack = generate_ack(&parse(raw).unwrap(), AckCode::ApplicationAccept, None);
    let wire = encode(&ack);

    assert!(wire.starts_with("MSH#*+!@#CADUCEUS#HOSP#EHR#WARD#"));
    assert!(wire.contains("MSA#AA#MSG9"));
}

#[test_case("AA", Ok(AckCode::ApplicationAccept) ; "aa")]
#[test_case("ce", Ok(AckCode::ApplicationError) ; "commit error")]
#[test_case("AR", Ok(AckCode::ApplicationReject) ; "ar")]
fn test_ack_code_parsing(raw: &str, expected: Result<AckCode, ()>) {
    assert_eq!(raw.parse::<AckCode>().map_err(|_| ()), expected);
}

#[test]
fn test_invalid_ack_code() {
    assert!("XX".parse::<AckCode>().is_err());
}
