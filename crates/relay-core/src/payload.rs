//! Serialized event payload.

use bytes::Bytes;

/// Content type of JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Immutable serialized body of one dispatch.
///
/// Cloning is cheap: the body is reference counted, so every concurrent
/// delivery shares the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    body: Bytes,
    content_type: String,
}

impl Payload {
    /// Creates a payload with an explicit content type.
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self { body: body.into(), content_type: content_type.into() }
    }

    /// Creates a JSON payload.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(body, JSON_CONTENT_TYPE)
    }

    /// Returns the body as a shared buffer.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    /// Returns the raw body bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Returns the declared content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the body size in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Returns true if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_declares_content_type() {
        let payload = Payload::json(r#"{"event":"x"}"#);

        assert_eq!(payload.content_type(), JSON_CONTENT_TYPE);
        assert_eq!(payload.as_bytes(), br#"{"event":"x"}"#);
        assert_eq!(payload.len(), 13);
        assert!(!payload.is_empty());
    }

    #[test]
    fn body_shares_underlying_bytes() {
        let payload = Payload::new(Bytes::from_static(b"abc"), "text/plain");
        let body = payload.body();

        assert_eq!(body.as_ptr(), payload.as_bytes().as_ptr());
    }
}
