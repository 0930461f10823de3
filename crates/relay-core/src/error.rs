//! Error types for message handling.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while decoding or serializing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Message could not be decoded from its wire form.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Message could not be serialized into a payload.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Returns true if the error came from decoding untrusted input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidMessage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        let error = CoreError::InvalidMessage("missing field `type`".to_string());
        assert_eq!(error.to_string(), "invalid message: missing field `type`");
        assert!(error.is_invalid_input());

        let error = CoreError::Serialization("key must be a string".to_string());
        assert_eq!(error.to_string(), "serialization failed: key must be a string");
        assert!(!error.is_invalid_input());
    }
}
