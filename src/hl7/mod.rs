//! HL7v2 codec
//!
//! Segment/Field model, parser, encoder, escaping, time formats and the
//! acknowledgment generator. Everything here is synchronous and operates on
//! owned data, so it can run on any number of threads at once.

pub mod ack;
pub mod encoder;
pub mod escape;
pub mod model;
pub mod parser;
pub mod time;

pub use ack::{generate_ack, generate_error_ack, generate_reject, AckCode};
pub use encoder::encode;
pub use escape::{escape, unescape};
pub use model::{Component, EncodingChars, Field, Message, Repetition, Segment};
pub use parser::parse;
