//! Conversation messages and tool call/result types threaded through a run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One entry in the conversation history fed to the LLM.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { content: String },
    User { content: String },
    /// A persisted assistant turn; `tool_calls` carries native-form calls only
    /// (XML calls live inline in `content`).
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// A tool-result message fed back to the LLM on the next turn.
    Tool {
        tool_call_id: Option<String>,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant { content: content.into(), tool_calls }
    }

    pub fn tool(tool_call_id: Option<String>, content: impl Into<String>) -> Self {
        Message::Tool { tool_call_id, content: content.into() }
    }
}

/// A tool invocation requested by the LLM, in either the XML or native form.
///
/// `uid` is assigned at construction and never derived from `function_name` or
/// `arguments` — it is what lets the processor deduplicate a call discovered
/// twice (once while streaming, once in the post-stream scan) by identity of
/// the call record rather than by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub uid: String,
    pub function_name: String,
    pub arguments: Map<String, Value>,
    /// Present for native calls; absent for XML calls.
    pub id: Option<String>,
    /// Hyphenated alias for legacy display, present for XML calls.
    pub xml_tag_name: Option<String>,
}

impl ToolCall {
    pub fn new_native(id: String, function_name: String, arguments: Map<String, Value>) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            function_name,
            arguments,
            id: Some(id),
            xml_tag_name: None,
        }
    }

    pub fn new_xml(function_name: String, arguments: Map<String, Value>) -> Self {
        let xml_tag_name = function_name.replace('_', "-");
        Self {
            uid: Uuid::new_v4().to_string(),
            function_name,
            arguments,
            id: None,
            xml_tag_name: Some(xml_tag_name),
        }
    }

    pub fn is_terminating(&self) -> bool {
        matches!(self.function_name.as_str(), "ask" | "complete")
    }
}

/// The outcome of executing one [`ToolCall`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: ToolOutput,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<ToolOutput>) -> Self {
        Self { success: true, output: output.into(), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self { success: false, output: ToolOutput::Text(error.clone()), error: Some(error) }
    }

    /// A result for an unknown tool name: failure, but never an exception.
    pub fn unknown_tool(name: &str) -> Self {
        Self::failure(format!("unknown tool: {name}"))
    }
}

/// The payload of a [`ToolResult`]: either plain text or a structured JSON
/// value that viewers can render specially.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl From<String> for ToolOutput {
    fn from(s: String) -> Self {
        ToolOutput::Text(s)
    }
}

impl From<&str> for ToolOutput {
    fn from(s: &str) -> Self {
        ToolOutput::Text(s.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(v: Value) -> Self {
        ToolOutput::Structured(v)
    }
}

/// Ephemeral bookkeeping the processor threads through a tool's lifecycle
/// (`ToolExecutionContext`): never persisted, used only to correlate a
/// `tool_started` status with its terminal status and result message.
#[derive(Clone, Debug)]
pub struct ToolExecutionContext {
    pub tool_call: ToolCall,
    pub tool_index: usize,
    pub assistant_message_id: Option<String>,
    pub result: Option<ToolResult>,
    pub parsing_details: Option<Value>,
}

impl ToolExecutionContext {
    pub fn new(tool_call: ToolCall, tool_index: usize) -> Self {
        Self {
            tool_call,
            tool_index,
            assistant_message_id: None,
            result: None,
            parsing_details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_tag_name_is_hyphenated_function_name() {
        let call = ToolCall::new_xml("list_files".into(), Map::new());
        assert_eq!(call.xml_tag_name.as_deref(), Some("list-files"));
        assert!(call.id.is_none());
    }

    #[test]
    fn native_call_carries_id_and_no_xml_tag() {
        let call = ToolCall::new_native("call_1".into(), "list_files".into(), Map::new());
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert!(call.xml_tag_name.is_none());
    }

    #[test]
    fn two_calls_with_identical_shape_have_distinct_identity() {
        let a = ToolCall::new_xml("ask".into(), Map::new());
        let b = ToolCall::new_xml("ask".into(), Map::new());
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn terminating_tools_are_ask_and_complete() {
        assert!(ToolCall::new_xml("ask".into(), Map::new()).is_terminating());
        assert!(ToolCall::new_xml("complete".into(), Map::new()).is_terminating());
        assert!(!ToolCall::new_xml("list_files".into(), Map::new()).is_terminating());
    }
}
