//! Error types for the deferral crate

use crate::value::Value;
use thiserror::Error;

/// Main error type for deferral
///
/// Errors never escape the public settlement boundary: anything raised by a
/// resolver, a continuation handler, or a thenable's `then` member is caught
/// and converted into a rejection payload via [`Error::into_reason`].
#[derive(Error, Debug)]
pub enum Error {
    /// TypeError - wrong type for operation (non-callable call target,
    /// self-resolution, ...)
    #[error("TypeError: {message}")]
    Type { message: String },

    /// A value thrown by caller-supplied code (handler, resolver, or
    /// thenable). Carries the thrown payload verbatim.
    #[error("uncaught: {0}")]
    Thrown(Value),
}

impl Error {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
        }
    }

    /// Wrap a thrown payload
    pub fn thrown(value: Value) -> Self {
        Error::Thrown(value)
    }

    /// Convert into a rejection reason
    ///
    /// Thrown payloads pass through untouched; type errors become error
    /// objects with `name`/`message` properties.
    pub fn into_reason(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            Error::Type { message } => Value::new_error("TypeError", &message),
        }
    }
}

/// Result type alias for deferral
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
///
/// These constants provide consistent error messages following the
/// conventions of the protocol this crate implements.
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const SELF_RESOLUTION: &str = "cannot resolve a promise with itself";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_FUNCTION)
    }
}
