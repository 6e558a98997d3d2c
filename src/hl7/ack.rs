//! Acknowledgment generator
//!
//! Builds `ACK` messages that correlate to an inbound message through MSA-2.
//! Sender and receiver are swapped and the `ACK` gets its own control ID.
//!
//! When the inbound text could not be parsed, [`generate_reject`] salvages
//! what it can from the raw header line so the `AR` still correlates.

use super::model::{EncodingChars, Field, Message, Segment, MSH};
use super::parser::parse_field;
use super::time::format_timestamp;
use crate::domain::{ControlId, Hl7Error};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT_PROCESSING_ID: &str = "P";
const DEFAULT_VERSION_ID: &str = "2.5";
const ERROR_CODE_TABLE: &str = "HL70357";

/// MSA-1 acknowledgment code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckCode {
    #[serde(rename = "AA")]
    ApplicationAccept,
    #[serde(rename = "AE")]
    ApplicationError,
    #[serde(rename = "AR")]
    ApplicationReject,
}

impl AckCode {
    /// Wire form: `AA`, `AE` or `AR`
    pub fn as_str(&self) -> &'static str {
        match self {
            AckCode::ApplicationAccept => "AA",
            AckCode::ApplicationError => "AE",
            AckCode::ApplicationReject => "AR",
        }
    }

    /// True for `AA`
    pub fn is_accept(&self) -> bool {
        matches!(self, AckCode::ApplicationAccept)
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // CA/CE/CR are the commit-level equivalents used by enhanced mode
        match s.trim().to_ascii_uppercase().as_str() {
            "AA" | "CA" => Ok(AckCode::ApplicationAccept),
            "AE" | "CE" => Ok(AckCode::ApplicationError),
            "AR" | "CR" => Ok(AckCode::ApplicationReject),
            other => Err(format!("Invalid acknowledgment code '{other}'. Expected AA, AE or AR")),
        }
    }
}

/// Condition code written to ERR-3 (HL7 table 0357)
///
/// Only the conditions the engine can actually raise are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCondition {
    SegmentSequence,
    RequiredFieldMissing,
    DataType,
    UnsupportedMessageType,
    ApplicationInternal,
}

impl ErrorCondition {
    fn code(&self) -> &'static str {
        match self {
            ErrorCondition::SegmentSequence => "100",
            ErrorCondition::RequiredFieldMissing => "101",
            ErrorCondition::DataType => "102",
            ErrorCondition::UnsupportedMessageType => "200",
            ErrorCondition::ApplicationInternal => "207",
        }
    }

    fn text(&self) -> &'static str {
        match self {
            ErrorCondition::SegmentSequence => "Segment sequence error",
            ErrorCondition::RequiredFieldMissing => "Required field missing",
            ErrorCondition::DataType => "Data type error",
            ErrorCondition::UnsupportedMessageType => "Unsupported message type",
            ErrorCondition::ApplicationInternal => "Application internal error",
        }
    }
}

impl From<&Hl7Error> for ErrorCondition {
    fn from(err: &Hl7Error) -> Self {
        match err {
            Hl7Error::MalformedMessage(_) => ErrorCondition::SegmentSequence,
            Hl7Error::InvalidEncoding(_) => ErrorCondition::DataType,
            Hl7Error::UnsupportedMessageType(_) | Hl7Error::MessageTypeMismatch { .. } => {
                ErrorCondition::UnsupportedMessageType
            }
            Hl7Error::SegmentNotFound(_) | Hl7Error::FieldMapping { .. } => {
                ErrorCondition::RequiredFieldMissing
            }
            Hl7Error::Handler(_) | Hl7Error::Timeout(_) => ErrorCondition::ApplicationInternal,
        }
    }
}

/// Header values an acknowledgment needs from the message it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckHeader {
    pub encoding: EncodingChars,
    pub sending_application: Field,
    pub sending_facility: Field,
    pub receiving_application: Field,
    pub receiving_facility: Field,
    pub control_id: String,
    pub trigger_event: String,
    pub processing_id: String,
    pub version_id: String,
}

impl AckHeader {
    /// Reads the header of a parsed message
    pub fn from_message(message: &Message) -> Self {
        let msh = message.msh();
        let field = |n: usize| msh.field(n).cloned().unwrap_or_default();
        Self {
            encoding: *message.encoding(),
            sending_application: field(3),
            sending_facility: field(4),
            receiving_application: field(5),
            receiving_facility: field(6),
            control_id: message.control_id().to_string(),
            trigger_event: message.trigger_event().to_string(),
            processing_id: message.processing_id().to_string(),
            version_id: message.version_id().to_string(),
        }
    }

    /// Recovers header values from text that failed to parse
    ///
    /// Looks only at the first line. When it does not start with `MSH` every
    /// value is empty and the default encoding characters are used.
    pub fn salvage(raw: &str) -> Self {
        let mut header = Self {
            encoding: EncodingChars::default(),
            sending_application: Field::empty(),
            sending_facility: Field::empty(),
            receiving_application: Field::empty(),
            receiving_facility: Field::empty(),
            control_id: String::new(),
            trigger_event: String::new(),
            processing_id: String::new(),
            version_id: String::new(),
        };

        let first = raw
            .split(['\r', '\n'])
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default();
        let Some(rest) = first.strip_prefix(MSH) else {
            return header;
        };
        let Some(separator) = rest.chars().next() else {
            return header;
        };

        // parts[0] is empty (text before the first separator), parts[n - 1] is MSH-n
        let parts: Vec<&str> = rest.split(separator).collect();
        let raw_field = |n: usize| parts.get(n - 1).copied().unwrap_or_default();

        // a broken MSH-2 falls back to the standard set
        let encoding =
            EncodingChars::from_header(separator, raw_field(2)).unwrap_or_default();
        let field = |n: usize| parse_field(raw_field(n), &encoding);

        header.sending_application = field(3);
        header.sending_facility = field(4);
        header.receiving_application = field(5);
        header.receiving_facility = field(6);
        header.trigger_event = field(9).component(2).unwrap_or_default().to_string();
        header.control_id = field(10).value().to_string();
        header.processing_id = field(11).value().to_string();
        header.version_id = field(12).value().to_string();
        header.encoding = encoding;
        header
    }
}

/// Builds an acknowledgment for a parsed message
///
/// MSA-3 and an `ERR` segment are only written for `AE`/`AR`. Without an
/// explicit detail a non-accept code gets a generic text.
pub fn generate_ack(original: &Message, code: AckCode, error_detail: Option<&str>) -> Message {
    build_ack(
        &AckHeader::from_message(original),
        code,
        error_detail,
        ErrorCondition::ApplicationInternal,
    )
}

/// Builds the `AE` for a parsed message whose processing failed
///
/// The message parsed, so the code is `AE` whatever the error kind; `AR` is
/// reserved for [`generate_reject`]. ERR-3 and the text still follow the error.
pub fn generate_error_ack(original: &Message, error: &Hl7Error) -> Message {
    let detail = error.to_string();
    build_ack(
        &AckHeader::from_message(original),
        AckCode::ApplicationError,
        Some(&detail),
        ErrorCondition::from(error),
    )
}

/// Builds a best-effort `AR` for text that could not be parsed
pub fn generate_reject(raw: &str, error: &Hl7Error) -> Message {
    let detail = error.to_string();
    build_ack(
        &AckHeader::salvage(raw),
        AckCode::ApplicationReject,
        Some(&detail),
        ErrorCondition::from(error),
    )
}

/// Builds an acknowledgment from explicit header values
pub fn build_ack(
    header: &AckHeader,
    code: AckCode,
    error_detail: Option<&str>,
    condition: ErrorCondition,
) -> Message {
    let message_type = if header.trigger_event.is_empty() {
        Field::from("ACK")
    } else {
        Field::components(["ACK", header.trigger_event.as_str(), "ACK"])
    };

    let msh = Segment::new(MSH)
        .with(3, header.receiving_application.clone())
        .with(4, header.receiving_facility.clone())
        .with(5, header.sending_application.clone())
        .with(6, header.sending_facility.clone())
        .with(7, format_timestamp(&Local::now().naive_local()))
        .with(9, message_type)
        .with(10, ControlId::generate().into_inner())
        .with(11, non_empty_or(&header.processing_id, DEFAULT_PROCESSING_ID))
        .with(12, non_empty_or(&header.version_id, DEFAULT_VERSION_ID));

    let mut segments = vec![msh];

    let mut msa = Segment::new("MSA")
        .with(1, code.as_str())
        .with(2, header.control_id.as_str());

    if code.is_accept() {
        segments.push(msa);
    } else {
        let text = error_detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| condition.text())
            .to_string();
        msa.set_field(3, text.as_str());
        segments.push(msa);
        segments.push(
            Segment::new("ERR")
                .with(
                    3,
                    Field::components([condition.code(), condition.text(), ERROR_CODE_TABLE]),
                )
                .with(4, "E")
                .with(8, text),
        );
    }

    Message::from_trusted(header.encoding, segments)
}

/// MSA-1 of an acknowledgment
pub fn ack_code_of(message: &Message) -> Option<AckCode> {
    message.segment("MSA")?.value(1).parse().ok()
}

/// MSA-2 of an acknowledgment
pub fn acknowledged_control_id(message: &Message) -> Option<&str> {
    message
        .segment("MSA")
        .map(|msa| msa.value(2))
        .filter(|id| !id.is_empty())
}

/// MSA-3 of an acknowledgment
pub fn ack_text(message: &Message) -> Option<&str> {
    message
        .segment("MSA")
        .map(|msa| msa.value(3))
        .filter(|text| !text.is_empty())
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}
