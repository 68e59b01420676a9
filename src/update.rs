use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RelayError;

/// Wire shape of a Bot API update; only the fields the relay reads.
#[derive(Debug, Deserialize)]
struct RawUpdate {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    inline_query: Option<RawInlineQuery>,
    /// Remaining top-level keys, in payload order.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawInlineQuery {
    id: String,
    #[serde(default)]
    query: String,
}

/// One inbound webhook delivery, validated and classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Message { chat_id: i64, text: String },
    InlineQuery { id: String, query: String },
    /// A well-formed update this relay does not act on.
    Ignored { kind: String },
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        if let Some(message) = raw.message {
            return match message.text {
                Some(text) => Update::Message {
                    chat_id: message.chat.id,
                    text,
                },
                None => Update::Ignored {
                    kind: "message_without_text".to_string(),
                },
            };
        }

        if let Some(query) = raw.inline_query {
            return Update::InlineQuery {
                id: query.id,
                query: query.query,
            };
        }

        let kind = raw
            .rest
            .keys()
            .find(|key| key.as_str() != "update_id")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        Update::Ignored { kind }
    }
}

impl Update {
    /// Deserialize a webhook body. Anything that does not fit the schema is
    /// an `InvalidPayload`.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        let raw: RawUpdate = serde_json::from_slice(body)
            .map_err(|e| RelayError::InvalidPayload(e.to_string()))?;
        Ok(raw.into())
    }

    pub fn kind(&self) -> &str {
        match self {
            Update::Message { .. } => "message",
            Update::InlineQuery { .. } => "inline_query",
            Update::Ignored { kind } => kind,
        }
    }
}
