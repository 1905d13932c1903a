//! Channel Message Codec
//!
//! Decodes raw payloads received on the stream channel into typed [`Event`]s.
//!
//! The wire format is a JSON object with an `event` discriminator and, for
//! `new` events, the `id` of the content that appeared in the stream:
//!
//! ```json
//! {"event": "new", "id": 42}
//! ```
//!
//! Unknown fields are ignored. Content ids may be JSON strings or integers;
//! both are normalized to strings.

use serde::Deserialize;
use serde_json::Value;

use super::error::DecodeError;

/// Event kind announcing new content in the stream
pub const NEW_CONTENT: &str = "new";

/// A single frame delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// A decoded, validated channel event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event discriminator (`event` on the wire)
    pub kind: String,
    /// Content identifier (`id` on the wire); always set for `new` events
    pub content_id: Option<String>,
}

impl Event {
    /// Create a `new` content event
    pub fn new_content(content_id: impl Into<String>) -> Self {
        Self {
            kind: NEW_CONTENT.to_string(),
            content_id: Some(content_id.into()),
        }
    }
}

/// Wire representation, lenient about field types so that errors can be
/// reported precisely.
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    event: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

/// Decode a text payload
pub fn decode(raw: &str) -> Result<Event, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    }

    let raw_event: RawEvent = serde_json::from_value(value)?;

    let kind = match raw_event.event {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingKind),
    };

    let content_id = raw_event.id.and_then(content_id_from_value);

    if kind == NEW_CONTENT && content_id.is_none() {
        return Err(DecodeError::MissingContentId(kind));
    }

    Ok(Event { kind, content_id })
}

/// Decode a transport frame
///
/// Binary frames are accepted when they carry UTF-8 text.
pub fn decode_frame(frame: &Frame) -> Result<Event, DecodeError> {
    match frame {
        Frame::Text(text) => decode(text),
        Frame::Binary(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
            decode(text)
        }
    }
}

fn content_id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_new_with_numeric_id() {
        let event = decode(r#"{"event": "new", "id": 42}"#).unwrap();
        assert_eq!(event, Event::new_content("42"));
    }

    #[test]
    fn test_decode_new_with_string_id() {
        let event = decode(r#"{"event": "new", "id": "abc-123"}"#).unwrap();
        assert_eq!(event.content_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let event = decode(r#"{"event": "new", "id": 7, "author": "alice", "extra": [1, 2]}"#)
            .unwrap();
        assert_eq!(event, Event::new_content("7"));
    }

    #[test]
    fn test_decode_unknown_kind_without_id() {
        let event = decode(r#"{"event": "unknown-kind"}"#).unwrap();
        assert_eq!(event.kind, "unknown-kind");
        assert!(event.content_id.is_none());
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode("[1, 2]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("\"new\""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_missing_kind() {
        assert!(matches!(decode(r#"{"id": 42}"#), Err(DecodeError::MissingKind)));
        assert!(matches!(
            decode(r#"{"event": 5, "id": 42}"#),
            Err(DecodeError::MissingKind)
        ));
    }

    #[test]
    fn test_decode_new_requires_id() {
        assert!(matches!(
            decode(r#"{"event": "new"}"#),
            Err(DecodeError::MissingContentId(_))
        ));
        assert!(matches!(
            decode(r#"{"event": "new", "id": null}"#),
            Err(DecodeError::MissingContentId(_))
        ));
        assert!(matches!(
            decode(r#"{"event": "new", "id": 1.5}"#),
            Err(DecodeError::MissingContentId(_))
        ));
    }

    #[test]
    fn test_decode_binary_frame() {
        let frame = Frame::Binary(br#"{"event": "new", "id": 9}"#.to_vec());
        assert_eq!(decode_frame(&frame).unwrap(), Event::new_content("9"));

        let frame = Frame::Binary(vec![0xff, 0xfe, 0x00]);
        assert!(matches!(decode_frame(&frame), Err(DecodeError::NotUtf8)));
    }
}
