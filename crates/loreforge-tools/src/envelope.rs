//! The response envelope and its embedded machine-readable block.
//!
//! Every tool responds with `{content: [{type: "text", text}]}`. When a
//! response carries state, the JSON payload is embedded in the text
//! between `STATE_JSON` delimiters so downstream parsers can recover it
//! without re-parsing prose. Error responses carry a human sentence plus
//! `{error: true, kind, message, details?}` in the same block -- this is a
//! stable contract for the orchestrator.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Opening delimiter of the embedded state block.
pub const STATE_OPEN: &str = "<!-- STATE_JSON";

/// Closing delimiter of the embedded state block.
pub const STATE_CLOSE: &str = "STATE_JSON -->";

/// One block of response content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// A text block; the only kind the engine emits.
    Text {
        /// The text, possibly carrying an embedded state block.
        text: String,
    },
}

/// The envelope returned by every tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The content blocks, in order.
    pub content: Vec<ContentBlock>,
}

impl ToolResponse {
    /// A plain text response with no state payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A narrated response with the machine-readable payload embedded.
    pub fn narrated<T: Serialize>(text: &str, payload: &T) -> Result<Self, ToolError> {
        let json = serde_json::to_string(payload)?;
        Ok(Self::text(format!(
            "{text}\n\n{STATE_OPEN}\n{json}\n{STATE_CLOSE}"
        )))
    }

    /// Render an error into the envelope: human sentence plus structured
    /// payload.
    pub fn from_error(error: &ToolError) -> Self {
        let mut payload = serde_json::json!({
            "error": true,
            "kind": error.kind(),
            "message": error.to_string(),
        });
        if let (Some(details), Some(object)) = (error.details(), payload.as_object_mut()) {
            object.insert(String::from("details"), details);
        }
        let json = payload.to_string();
        Self::text(format!(
            "The request failed: {error}\n\n{STATE_OPEN}\n{json}\n{STATE_CLOSE}"
        ))
    }

    /// The concatenated text of every block.
    pub fn full_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Recover the embedded state payload, if any -- the downstream-parser
    /// side of the contract.
    pub fn extract_state(&self) -> Option<serde_json::Value> {
        let text = self.full_text();
        let start = text.find(STATE_OPEN)?;
        let after_open = start.checked_add(STATE_OPEN.len())?;
        let rest = text.get(after_open..)?;
        let end = rest.find(STATE_CLOSE)?;
        serde_json::from_str(rest.get(..end)?.trim()).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn narrated_responses_round_trip_their_payload() {
        let payload = serde_json::json!({"hp": 17, "defeated": false});
        let response =
            ToolResponse::narrated("The goblin staggers under the blow.", &payload).unwrap();
        assert_eq!(response.extract_state(), Some(payload));
        assert!(response.full_text().starts_with("The goblin staggers"));
    }

    #[test]
    fn plain_text_has_no_state() {
        let response = ToolResponse::text("Nothing to see.");
        assert_eq!(response.extract_state(), None);
    }

    #[test]
    fn error_envelope_carries_kind_and_details() {
        let error = ToolError::not_found("character", "ghost");
        let response = ToolResponse::from_error(&error);
        let state = response.extract_state().unwrap();
        assert_eq!(state.get("error"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(
            state.get("kind").and_then(|k| k.as_str()),
            Some("not_found")
        );
        assert_eq!(
            state
                .pointer("/details/entity")
                .and_then(|v| v.as_str()),
            Some("character")
        );
    }

    #[test]
    fn envelope_serializes_to_the_wire_shape() {
        let response = ToolResponse::text("hello");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"content": [{"type": "text", "text": "hello"}]})
        );
    }
}
