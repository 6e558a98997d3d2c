//! Segment/Field model
//!
//! In-memory representation of an HL7v2 message: an ordered list of segments,
//! each an ordered list of fields. Field positions are 1-indexed the way HL7
//! documents them (`PID-5` is `segment.field(5)`).
//!
//! A field without any repetition, component or sub-component separator is a
//! [`Field::Scalar`]; anything richer is a [`Field::Composite`] of repetitions,
//! components and sub-components.

use crate::domain::{Hl7Error, Hl7Result, MessageKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment type of the message header
pub const MSH: &str = "MSH";

/// The five delimiter characters declared in MSH-1 and MSH-2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingChars {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for EncodingChars {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl EncodingChars {
    /// Creates a delimiter set, rejecting duplicates and line terminators
    pub fn new(
        field: char,
        component: char,
        repetition: char,
        escape: char,
        subcomponent: char,
    ) -> Hl7Result<Self> {
        let chars = [field, component, repetition, escape, subcomponent];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\r' || *c == '\n' {
                return Err(Hl7Error::InvalidEncoding(
                    "segment terminators cannot be used as delimiters".to_string(),
                ));
            }
            if chars[i + 1..].contains(c) {
                return Err(Hl7Error::InvalidEncoding(format!(
                    "delimiter '{c}' is declared more than once"
                )));
            }
        }
        Ok(Self {
            field,
            component,
            repetition,
            escape,
            subcomponent,
        })
    }

    /// Builds the set from MSH-1 and the four characters of MSH-2
    ///
    /// MSH-2 lists component, repetition, escape and sub-component separators
    /// in that fixed order.
    pub fn from_header(field: char, encoding: &str) -> Hl7Result<Self> {
        let chars: Vec<char> = encoding.chars().collect();
        if chars.len() != 4 {
            return Err(Hl7Error::InvalidEncoding(format!(
                "MSH-2 must be exactly 4 characters, got {}",
                chars.len()
            )));
        }
        Self::new(field, chars[0], chars[1], chars[2], chars[3])
    }

    /// Parses the five-character form used in configuration, e.g. `|^~\&`
    pub fn parse(declared: &str) -> Hl7Result<Self> {
        let mut chars = declared.chars();
        let field = chars.next().ok_or_else(|| {
            Hl7Error::InvalidEncoding("encoding characters cannot be empty".to_string())
        })?;
        Self::from_header(field, chars.as_str())
    }

    /// MSH-2 value: the four characters after the field separator
    pub fn encoding_field(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    /// Returns true when `c` is one of the five delimiters
    pub fn is_delimiter(&self, c: char) -> bool {
        c == self.field
            || c == self.component
            || c == self.repetition
            || c == self.escape
            || c == self.subcomponent
    }
}

impl fmt::Display for EncodingChars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.field, self.encoding_field())
    }
}

/// A component: one or more sub-components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Component {
    pub subcomponents: Vec<String>,
}

impl Component {
    /// Component holding a single value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            subcomponents: vec![value.into()],
        }
    }

    /// First sub-component, or the empty string
    pub fn value(&self) -> &str {
        self.subcomponents.first().map(String::as_str).unwrap_or("")
    }
}

/// One repetition of a field: an ordered list of components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Repetition {
    pub components: Vec<Component>,
}

impl Repetition {
    /// Repetition whose components each hold a single value
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: values.into_iter().map(Component::new).collect(),
        }
    }

    /// Component `n` (1-indexed), first sub-component
    pub fn component(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.components.get(i))
            .map(Component::value)
    }
}

/// A field value
///
/// `Scalar` is the common case; `Composite` holds repetitions of components
/// of sub-components and appears whenever the wire value contained one of the
/// structural separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Scalar(String),
    Composite(Vec<Repetition>),
}

impl Default for Field {
    fn default() -> Self {
        Field::Scalar(String::new())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Scalar(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Scalar(value)
    }
}

impl Field {
    /// Present-but-blank field
    pub fn empty() -> Self {
        Field::default()
    }

    /// Field from a list of component values
    ///
    /// Trailing empty components are dropped; a single remaining component
    /// collapses to a scalar.
    pub fn components<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        while values.len() > 1 && values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        match values.len() {
            0 => Field::empty(),
            1 => Field::Scalar(values.remove(0)),
            _ => Field::Composite(vec![Repetition::from_values(values)]),
        }
    }

    /// Field from several repetitions
    pub fn repeated(repetitions: Vec<Repetition>) -> Self {
        Field::Composite(repetitions).normalized()
    }

    /// Collapses a composite holding a single leaf into a scalar
    pub fn normalized(self) -> Self {
        match self {
            Field::Composite(mut reps)
                if reps.len() == 1
                    && reps[0].components.len() == 1
                    && reps[0].components[0].subcomponents.len() == 1 =>
            {
                Field::Scalar(reps.remove(0).components.remove(0).subcomponents.remove(0))
            }
            Field::Composite(reps) if reps.is_empty() => Field::empty(),
            other => other,
        }
    }

    /// First leaf value, or the empty string
    pub fn value(&self) -> &str {
        match self {
            Field::Scalar(value) => value,
            Field::Composite(reps) => reps
                .first()
                .and_then(|r| r.components.first())
                .map(Component::value)
                .unwrap_or(""),
        }
    }

    /// Component `n` (1-indexed) of the first repetition
    pub fn component(&self, n: usize) -> Option<&str> {
        match self {
            Field::Scalar(value) if n == 1 => Some(value),
            Field::Scalar(_) => None,
            Field::Composite(reps) => reps.first().and_then(|r| r.component(n)),
        }
    }

    /// Leaf at repetition `rep`, component `comp`, sub-component `sub` (all 1-indexed)
    pub fn subcomponent(&self, rep: usize, comp: usize, sub: usize) -> Option<&str> {
        match self {
            Field::Scalar(value) if rep == 1 && comp == 1 && sub == 1 => Some(value),
            Field::Scalar(_) => None,
            Field::Composite(reps) => reps
                .get(rep.checked_sub(1)?)?
                .components
                .get(comp.checked_sub(1)?)?
                .subcomponents
                .get(sub.checked_sub(1)?)
                .map(String::as_str),
        }
    }

    /// All repetitions; a scalar is a single repetition with one component
    pub fn repetitions(&self) -> Vec<Repetition> {
        match self {
            Field::Scalar(value) => vec![Repetition::from_values([value.as_str()])],
            Field::Composite(reps) => reps.clone(),
        }
    }

    /// True when every leaf is empty
    pub fn is_empty(&self) -> bool {
        match self {
            Field::Scalar(value) => value.is_empty(),
            Field::Composite(reps) => reps
                .iter()
                .flat_map(|r| r.components.iter())
                .flat_map(|c| c.subcomponents.iter())
                .all(String::is_empty),
        }
    }
}

/// A typed line of a message: segment type plus ordered fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    name: String,
    fields: Vec<Field>,
}

impl Segment {
    /// Empty segment of the given type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Segment with fields; `fields[0]` is field 1
    pub fn with_fields(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Segment type code, e.g. `PID`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in order, starting at field 1
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field `n` (1-indexed); `None` when the segment was truncated before it
    pub fn field(&self, n: usize) -> Option<&Field> {
        n.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// First leaf of field `n`, or the empty string when absent
    pub fn value(&self, n: usize) -> &str {
        self.field(n).map(Field::value).unwrap_or("")
    }

    /// Component `comp` of field `n`, or the empty string when absent
    pub fn component(&self, n: usize, comp: usize) -> &str {
        self.field(n).and_then(|f| f.component(comp)).unwrap_or("")
    }

    /// Sets field `n`, padding intermediate positions with empty fields
    pub fn set_field(&mut self, n: usize, field: impl Into<Field>) -> &mut Self {
        if n == 0 {
            return self;
        }
        if self.fields.len() < n {
            self.fields.resize(n, Field::empty());
        }
        self.fields[n - 1] = field.into();
        self
    }

    /// Chaining form of [`Segment::set_field`]
    pub fn with(mut self, n: usize, field: impl Into<Field>) -> Self {
        self.set_field(n, field);
        self
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the segment carries no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Returns true for a well-formed segment type: three characters, uppercase
/// letter first, then uppercase letters or digits
pub fn is_valid_segment_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 3
        && bytes[0].is_ascii_uppercase()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// A parsed or constructed HL7v2 message
///
/// Invariant: exactly one `MSH` segment, in first position, whose fields 1
/// and 2 match the message's encoding characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    encoding: EncodingChars,
    segments: Vec<Segment>,
}

impl Message {
    /// Assembles a message, validating the MSH invariant
    ///
    /// MSH-1 and MSH-2 are rewritten from `encoding` so the header always
    /// agrees with the delimiters used to serialise the message.
    pub fn new(encoding: EncodingChars, mut segments: Vec<Segment>) -> Hl7Result<Self> {
        match segments.first() {
            None => {
                return Err(Hl7Error::MalformedMessage(
                    "message contains no segments".to_string(),
                ))
            }
            Some(first) if first.name() != MSH => {
                return Err(Hl7Error::MalformedMessage(format!(
                    "first segment must be MSH, found '{}'",
                    first.name()
                )))
            }
            _ => {}
        }

        for (index, segment) in segments.iter().enumerate() {
            if !is_valid_segment_name(segment.name()) {
                return Err(Hl7Error::MalformedMessage(format!(
                    "segment {} has invalid type '{}'",
                    index + 1,
                    segment.name()
                )));
            }
            if index > 0 && segment.name() == MSH {
                return Err(Hl7Error::MalformedMessage(format!(
                    "unexpected second MSH segment at position {}",
                    index + 1
                )));
            }
        }

        let msh = &mut segments[0];
        msh.set_field(1, encoding.field.to_string());
        msh.set_field(2, encoding.encoding_field());

        Ok(Self { encoding, segments })
    }

    /// Assembles a message the engine built itself
    ///
    /// Callers guarantee a leading MSH and valid segment names.
    pub(crate) fn from_trusted(encoding: EncodingChars, mut segments: Vec<Segment>) -> Self {
        debug_assert!(segments.first().is_some_and(|s| s.name() == MSH));
        if let Some(msh) = segments.first_mut() {
            msh.set_field(1, encoding.field.to_string());
            msh.set_field(2, encoding.encoding_field());
        }
        Self { encoding, segments }
    }

    /// Delimiters declared by this message
    pub fn encoding(&self) -> &EncodingChars {
        &self.encoding
    }

    /// All segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consumes the message and returns its segments
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// The header segment
    pub fn msh(&self) -> &Segment {
        &self.segments[0]
    }

    /// First segment of the given type
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name() == name)
    }

    /// Every segment of the given type, in order
    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |s| s.name() == name)
    }

    /// MSH-3
    pub fn sending_application(&self) -> &str {
        self.msh().value(3)
    }

    /// MSH-4
    pub fn sending_facility(&self) -> &str {
        self.msh().value(4)
    }

    /// MSH-5
    pub fn receiving_application(&self) -> &str {
        self.msh().value(5)
    }

    /// MSH-6
    pub fn receiving_facility(&self) -> &str {
        self.msh().value(6)
    }

    /// MSH-7
    pub fn timestamp(&self) -> &str {
        self.msh().value(7)
    }

    /// MSH-9.1
    pub fn message_type(&self) -> &str {
        self.msh().component(9, 1)
    }

    /// MSH-9.2
    pub fn trigger_event(&self) -> &str {
        self.msh().component(9, 2)
    }

    /// MSH-9.3
    pub fn message_structure(&self) -> &str {
        self.msh().component(9, 3)
    }

    /// Type and trigger pair, when both are present
    pub fn key(&self) -> Option<MessageKey> {
        let (message_type, trigger) = (self.message_type(), self.trigger_event());
        if message_type.is_empty() || trigger.is_empty() {
            None
        } else {
            Some(MessageKey::new(message_type, trigger))
        }
    }

    /// MSH-10
    pub fn control_id(&self) -> &str {
        self.msh().value(10)
    }

    /// MSH-11
    pub fn processing_id(&self) -> &str {
        self.msh().value(11)
    }

    /// MSH-12
    pub fn version_id(&self) -> &str {
        self.msh().value(12)
    }
}
