//! Result type alias for Caduceus
//!
//! This module provides a convenient Result type alias that uses CaduceusError
//! as the error type.

use super::errors::CaduceusError;

/// Result type alias for Caduceus operations
///
/// # Examples
///
/// ```
/// use caduceus::domain::result::Result;
/// use caduceus::domain::errors::CaduceusError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CaduceusError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CaduceusError>;

/// Result alias for codec, dispatch and mapping operations
pub type Hl7Result<T> = std::result::Result<T, super::errors::Hl7Error>;
