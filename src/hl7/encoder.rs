//! [`Message`] to wire text

use super::escape::escape;
use super::model::{EncodingChars, Field, Message, Segment, MSH};

/// Segment terminator emitted on output
pub const SEGMENT_TERMINATOR: char = '\r';

/// Serialises a message with its own encoding characters
///
/// Every segment, including the last, is terminated by `\r`.
pub fn encode(message: &Message) -> String {
    let encoding = message.encoding();
    let mut out = String::new();
    for segment in message.segments() {
        out.push_str(&encode_segment(segment, encoding));
        out.push(SEGMENT_TERMINATOR);
    }
    out
}

/// Serialises one segment without its terminator
pub fn encode_segment(segment: &Segment, encoding: &EncodingChars) -> String {
    let mut out = String::from(segment.name());

    let fields = if segment.name() == MSH {
        // MSH-1 is the separator itself and MSH-2 is written verbatim
        out.push(encoding.field);
        out.push_str(&encoding.encoding_field());
        segment.fields().get(2..).unwrap_or_default()
    } else {
        segment.fields()
    };

    for field in fields {
        out.push(encoding.field);
        out.push_str(&encode_field(field, encoding));
    }
    out
}

/// Serialises one field, escaping each leaf
pub fn encode_field(field: &Field, encoding: &EncodingChars) -> String {
    match field {
        Field::Scalar(value) => escape(value, encoding).into_owned(),
        Field::Composite(repetitions) => {
            let mut out = String::new();
            for (r, repetition) in repetitions.iter().enumerate() {
                if r > 0 {
                    out.push(encoding.repetition);
                }
                for (c, component) in repetition.components.iter().enumerate() {
                    if c > 0 {
                        out.push(encoding.component);
                    }
                    for (s, sub) in component.subcomponents.iter().enumerate() {
                        if s > 0 {
                            out.push(encoding.subcomponent);
                        }
                        out.push_str(&escape(sub, encoding));
                    }
                }
            }
            out
        }
    }
}
