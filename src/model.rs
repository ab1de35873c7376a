//! Wire types for the explanation streaming endpoint.

use serde::{Deserialize, Serialize};

use crate::sse;

/// Immutable input to one explanation stream.
///
/// Serialized as the JSON request body:
/// `{"prompt": "...", "requestId": "..."}`. The request id is optional on
/// the wire; when present it deduplicates repeated triggers of the same
/// explanation (see [`StreamingResponseConsumer::start`]).
///
/// [`StreamingResponseConsumer::start`]: crate::consumer::StreamingResponseConsumer::start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// The text the user wants explained.
    pub prompt: String,

    /// Client-chosen id for deduplicating duplicate triggers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl StreamRequest {
    /// Create a request without a request id.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            request_id: None,
        }
    }

    /// Set the request id used for duplicate-trigger suppression.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Decoded payload of one SSE frame from the explanation endpoint.
///
/// Content frames carry `{"content": "<incremental text>"}`; error frames
/// carry `{"error": "<message>"}`. Frames are transient and never stored.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainEvent {
    /// Incremental text to append to the visible answer.
    pub content: Option<String>,

    /// Server-reported in-band error message.
    pub error: Option<String>,
}

impl ExplainEvent {
    /// Parse a frame payload, unless it is the `[DONE]` sentinel.
    ///
    /// Returns `Ok(None)` for the sentinel, `Ok(Some(event))` for a
    /// well-formed JSON payload, and the parse error otherwise.
    pub fn parse(payload: &str) -> Result<Option<Self>, serde_json::Error> {
        if sse::is_done_marker(payload) {
            return Ok(None);
        }
        serde_json::from_str(payload).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let request = StreamRequest::new("explain XSS").with_request_id("req-1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"prompt": "explain XSS", "requestId": "req-1"})
        );
    }

    #[test]
    fn request_id_omitted_when_absent() {
        let json = serde_json::to_value(StreamRequest::new("explain XSS")).unwrap();
        assert!(json.get("requestId").is_none());
    }

    #[test]
    fn parse_content_event() {
        let event = ExplainEvent::parse("{\"content\":\"abc\"}").unwrap().unwrap();
        assert_eq!(event.content.as_deref(), Some("abc"));
        assert!(event.error.is_none());
    }

    #[test]
    fn parse_error_event() {
        let event = ExplainEvent::parse("{\"error\":\"rate limited\"}")
            .unwrap()
            .unwrap();
        assert_eq!(event.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn parse_sentinel_is_none() {
        assert!(ExplainEvent::parse("[DONE]").unwrap().is_none());
    }

    #[test]
    fn parse_malformed_is_err() {
        assert!(ExplainEvent::parse("not-json").is_err());
    }
}
