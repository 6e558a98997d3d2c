//! Raw HL7v2 text to [`Message`]
//!
//! The encoding characters are read from the message's own header, so two
//! messages parsed back to back may use different delimiters.

use super::escape::unescape;
use super::model::{
    is_valid_segment_name, Component, EncodingChars, Field, Message, Repetition, Segment, MSH,
};
use crate::domain::{Hl7Error, Hl7Result};

/// Parses raw HL7v2 text
///
/// Segments may be terminated by `\r`, `\n` or `\r\n`; blank lines are
/// discarded.
///
/// # Errors
///
/// Returns [`Hl7Error::MalformedMessage`] when the input is empty, does not
/// start with `MSH`, declares an MSH-2 other than four distinct characters,
/// or contains a segment without a valid type code.
///
/// # Examples
///
/// ```
/// use caduceus::hl7::parse;
///
/// let message = parse("MSH|^~\\&|LAB|HOSP|EHR|HOSP|20240101120000||ORU^R01|MSG1|P|2.5\r").unwrap();
/// assert_eq!(message.message_type(), "ORU");
/// assert_eq!(message.control_id(), "MSG1");
/// ```
pub fn parse(raw: &str) -> Hl7Result<Message> {
    let lines: Vec<&str> = raw
        .split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(header) = lines.first() else {
        return Err(Hl7Error::MalformedMessage("message is empty".to_string()));
    };

    let (encoding, msh) = parse_header(header)?;
    let mut segments = Vec::with_capacity(lines.len());
    segments.push(msh);

    for (index, line) in lines.iter().enumerate().skip(1) {
        segments.push(parse_segment(line, index + 1, &encoding)?);
    }

    Message::new(encoding, segments)
}

fn parse_header(line: &str) -> Hl7Result<(EncodingChars, Segment)> {
    let Some(after_name) = line.strip_prefix(MSH) else {
        return Err(Hl7Error::MalformedMessage(
            "message must start with an MSH segment".to_string(),
        ));
    };

    let mut chars = after_name.chars();
    let separator = chars.next().ok_or_else(|| {
        Hl7Error::MalformedMessage("MSH-1 field separator is missing".to_string())
    })?;

    let remainder = chars.as_str();
    let (declared, rest) = match remainder.find(separator) {
        Some(pos) => (&remainder[..pos], &remainder[pos..]),
        None => (remainder, ""),
    };

    if declared.is_empty() {
        return Err(Hl7Error::MalformedMessage(
            "MSH-2 encoding characters are missing".to_string(),
        ));
    }
    let encoding = EncodingChars::from_header(separator, declared)
        .map_err(|e| Hl7Error::MalformedMessage(e.to_string()))?;

    let mut fields = vec![
        Field::Scalar(separator.to_string()),
        Field::Scalar(declared.to_string()),
    ];
    if !rest.is_empty() {
        fields.extend(
            rest.split(separator)
                .skip(1)
                .map(|raw| parse_field(raw, &encoding)),
        );
    }

    Ok((encoding, Segment::with_fields(MSH, fields)))
}

fn parse_segment(line: &str, position: usize, encoding: &EncodingChars) -> Hl7Result<Segment> {
    let mut parts = line.split(encoding.field);
    let name = parts.next().unwrap_or_default();

    if name.is_empty() {
        return Err(Hl7Error::MalformedMessage(format!(
            "segment {position} has no segment type"
        )));
    }
    if !is_valid_segment_name(name) {
        return Err(Hl7Error::MalformedMessage(format!(
            "segment {position} has invalid type '{name}'"
        )));
    }
    if name == MSH {
        return Err(Hl7Error::MalformedMessage(format!(
            "unexpected second MSH segment at position {position}"
        )));
    }

    let fields = parts.map(|raw| parse_field(raw, encoding)).collect();
    Ok(Segment::with_fields(name, fields))
}

/// Decomposes one raw field string
///
/// Splits on repetition, then component, then sub-component separators and
/// unescapes each leaf. A field without any of those separators is a scalar.
pub fn parse_field(raw: &str, encoding: &EncodingChars) -> Field {
    let structured = raw.contains(encoding.repetition)
        || raw.contains(encoding.component)
        || raw.contains(encoding.subcomponent);

    if !structured {
        return Field::Scalar(unescape(raw, encoding).into_owned());
    }

    let repetitions = raw
        .split(encoding.repetition)
        .map(|rep| Repetition {
            components: rep
                .split(encoding.component)
                .map(|comp| Component {
                    subcomponents: comp
                        .split(encoding.subcomponent)
                        .map(|sub| unescape(sub, encoding).into_owned())
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Field::Composite(repetitions)
}
