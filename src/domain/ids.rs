//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for HL7 identifiers. Each type keeps
//! the raw wire value and validates it on construction.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SEQUENCE_SPAN: u32 = 36 * 36 * 36;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Message control identifier (MSH-10)
///
/// Control IDs correlate acknowledgments with the message that triggered them,
/// so generated values must not repeat.
///
/// # Examples
///
/// ```
/// use caduceus::domain::ids::ControlId;
///
/// let id = ControlId::new("MSG00001").unwrap();
/// assert_eq!(id.as_str(), "MSG00001");
///
/// let generated = ControlId::generate();
/// assert_eq!(generated.as_str().len(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlId(String);

impl ControlId {
    /// Creates a new ControlId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(ControlId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Control ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Generates a fresh control ID
    ///
    /// Format: `YYYYMMDDHHMMSS` followed by a three character process-wide
    /// sequence and three random characters, 20 characters in total.
    pub fn generate() -> Self {
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) % SEQUENCE_SPAN;
        let mut id = Utc::now().format("%Y%m%d%H%M%S").to_string();

        let mut digits = [0u8; 3];
        let mut rest = sequence;
        for slot in digits.iter_mut().rev() {
            *slot = BASE36[(rest % 36) as usize];
            rest /= 36;
        }
        id.extend(digits.iter().map(|b| *b as char));

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(3)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();
        id.push_str(&suffix);

        Self(id)
    }

    /// Returns the control ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ControlId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ControlId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Message type and trigger event pair (MSH-9.1 and MSH-9.2)
///
/// Displayed and parsed in wire form, e.g. `ADT^A01`.
///
/// # Examples
///
/// ```
/// use caduceus::domain::ids::MessageKey;
///
/// let key: MessageKey = "ORU^R01".parse().unwrap();
/// assert_eq!(key.message_type(), "ORU");
/// assert_eq!(key.trigger_event(), "R01");
/// assert_eq!(key, MessageKey::ORU_R01);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    message_type: Cow<'static, str>,
    trigger_event: Cow<'static, str>,
}

impl MessageKey {
    /// Admission
    pub const ADT_A01: MessageKey = MessageKey::from_static("ADT", "A01");
    /// Transfer
    pub const ADT_A02: MessageKey = MessageKey::from_static("ADT", "A02");
    /// Discharge
    pub const ADT_A03: MessageKey = MessageKey::from_static("ADT", "A03");
    /// Lab order
    pub const ORM_O01: MessageKey = MessageKey::from_static("ORM", "O01");
    /// Lab result
    pub const ORU_R01: MessageKey = MessageKey::from_static("ORU", "R01");

    const fn from_static(message_type: &'static str, trigger_event: &'static str) -> Self {
        Self {
            message_type: Cow::Borrowed(message_type),
            trigger_event: Cow::Borrowed(trigger_event),
        }
    }

    /// Creates a key from its two parts, normalised to uppercase
    pub fn new(message_type: impl Into<String>, trigger_event: impl Into<String>) -> Self {
        Self {
            message_type: Cow::Owned(message_type.into().trim().to_ascii_uppercase()),
            trigger_event: Cow::Owned(trigger_event.into().trim().to_ascii_uppercase()),
        }
    }

    /// Message type, e.g. `ADT`
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Trigger event, e.g. `A01`
    pub fn trigger_event(&self) -> &str {
        &self.trigger_event
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}^{}", self.message_type, self.trigger_event)
    }
}

impl FromStr for MessageKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('^');
        let message_type = parts.next().unwrap_or_default().trim();
        let trigger_event = parts.next().unwrap_or_default().trim();
        if message_type.is_empty() || trigger_event.is_empty() {
            return Err(format!(
                "Invalid message key '{s}'. Expected format: TYPE^EVENT (e.g. ADT^A01)"
            ));
        }
        Ok(Self::new(message_type, trigger_event))
    }
}
