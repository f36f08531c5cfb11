//! The `ResponseItem` wire shape: the unit of the response buffer and the
//! output stream to viewers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminates the four kinds of `ResponseItem`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Lifecycle event; `content.status_type` discriminates further.
    Status,
    /// Streamed chunk or persisted final assistant turn.
    Assistant,
    /// A tool-result message.
    Tool,
    /// One-shot record of the reconstructed provider response for a turn.
    AssistantResponseEnd,
}

/// The `content.status_type` values for `ItemType::Status` items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    ThreadRunStart,
    AssistantResponseStart,
    ToolStarted,
    ToolCompleted,
    ToolFailed,
    ToolError,
    Finish,
    ThreadRunEnd,
    Error,
}

impl StatusType {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusType::ThreadRunStart => "thread_run_start",
            StatusType::AssistantResponseStart => "assistant_response_start",
            StatusType::ToolStarted => "tool_started",
            StatusType::ToolCompleted => "tool_completed",
            StatusType::ToolFailed => "tool_failed",
            StatusType::ToolError => "tool_error",
            StatusType::Finish => "finish",
            StatusType::ThreadRunEnd => "thread_run_end",
            StatusType::Error => "error",
        }
    }
}

/// One record of the per-run response buffer.
///
/// All tags share this shape; `content` and `metadata` are loosely typed JSON
/// because their schema varies with `item_type` (and, for `Status`, with
/// `content.status_type`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseItem {
    pub message_id: Option<String>,
    pub thread_id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub content: Value,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
    pub is_llm_message: bool,
}

impl ResponseItem {
    pub fn new(
        thread_id: impl Into<String>,
        item_type: ItemType,
        content: Value,
        metadata: Value,
        is_llm_message: bool,
        timestamp: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.into();
        Self {
            message_id: None,
            thread_id: thread_id.into(),
            item_type,
            content,
            metadata,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            is_llm_message,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Reads `content.status_type` for `ItemType::Status` items.
    pub fn status_type(&self) -> Option<&str> {
        if self.item_type != ItemType::Status {
            return None;
        }
        self.content.get("status_type").and_then(Value::as_str)
    }

    /// Whether this item is a streamed (not-yet-persisted) assistant chunk.
    pub fn is_stream_chunk(&self) -> bool {
        self.item_type == ItemType::Assistant
            && self
                .metadata
                .get("stream_status")
                .and_then(Value::as_str)
                == Some("chunk")
    }

    /// True once this item marks the terminal end of a run's buffer.
    pub fn is_thread_run_end(&self) -> bool {
        self.status_type() == Some(StatusType::ThreadRunEnd.as_str())
    }

    /// True for any `finish` status item, regardless of reason.
    pub fn is_finish(&self) -> bool {
        self.status_type() == Some(StatusType::Finish.as_str())
    }

    /// The wire encoding sent to viewers: `content` and `metadata` are
    /// string-encoded JSON rather than nested objects, for client parity
    /// with the provider SDKs this stream imitates.
    pub fn to_wire_value(&self) -> Value {
        serde_json::json!({
            "message_id": self.message_id,
            "thread_id": self.thread_id,
            "type": self.item_type,
            "content": serde_json::to_string(&self.content).unwrap_or_default(),
            "metadata": serde_json::to_string(&self.metadata).unwrap_or_default(),
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "is_llm_message": self.is_llm_message,
        })
    }
}
