//! Builders for the `ResponseItem`s a run emits.
//!
//! Centralising the JSON shapes here keeps the processor and worker from
//! hand-assembling `content`/`metadata` objects inline, and gives every
//! status kind one place where its fields are documented.

use chrono::Utc;
use serde_json::{json, Value};

use runloom_wire::{ItemType, ResponseItem, StatusType};

use crate::llm::LlmUsage;
use crate::message::{ToolCall, ToolResult};

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn status(thread_id: &str, status_type: StatusType, mut content: Value) -> ResponseItem {
    content["status_type"] = json!(status_type.as_str());
    ResponseItem::new(thread_id, ItemType::Status, content, json!({}), false, now())
}

pub fn thread_run_start(thread_id: &str, run_id: &str) -> ResponseItem {
    status(thread_id, StatusType::ThreadRunStart, json!({"run_id": run_id}))
}

pub fn assistant_response_start(thread_id: &str) -> ResponseItem {
    status(thread_id, StatusType::AssistantResponseStart, json!({}))
}

pub fn tool_started(thread_id: &str, tool_index: usize, call: &ToolCall) -> ResponseItem {
    status(
        thread_id,
        StatusType::ToolStarted,
        json!({
            "tool_index": tool_index,
            "function_name": call.function_name,
            "xml_tag_name": call.xml_tag_name,
            "tool_call_id": call.id,
        }),
    )
}

pub fn tool_completed(thread_id: &str, tool_index: usize, call: &ToolCall) -> ResponseItem {
    status(
        thread_id,
        StatusType::ToolCompleted,
        json!({"tool_index": tool_index, "function_name": call.function_name}),
    )
}

pub fn tool_failed(thread_id: &str, tool_index: usize, call: &ToolCall, error: &str) -> ResponseItem {
    status(
        thread_id,
        StatusType::ToolFailed,
        json!({"tool_index": tool_index, "function_name": call.function_name, "error": error}),
    )
}

/// A tool raised rather than returning a failed result — distinct from
/// `tool_failed`, which is an expected, well-formed negative result.
pub fn tool_error(thread_id: &str, tool_index: usize, call: &ToolCall, error: &str) -> ResponseItem {
    status(
        thread_id,
        StatusType::ToolError,
        json!({"tool_index": tool_index, "function_name": call.function_name, "error": error}),
    )
}

pub fn finish(thread_id: &str, finish_reason: &str) -> ResponseItem {
    status(thread_id, StatusType::Finish, json!({"finish_reason": finish_reason}))
}

pub fn thread_run_end(thread_id: &str) -> ResponseItem {
    status(thread_id, StatusType::ThreadRunEnd, json!({}))
}

pub fn error(thread_id: &str, message: &str) -> ResponseItem {
    status(thread_id, StatusType::Error, json!({"message": message}))
}

/// A viewer-only marker emitted by Stream Fan-out itself, never written to
/// the buffer: `completed`/`error` when a viewer joins or drops out of a
/// run, distinct from the run's own `finish`/`error` status items.
pub fn fanout_status(thread_id: &str, status: &str) -> ResponseItem {
    ResponseItem::new(thread_id, ItemType::Status, json!({"status": status}), json!({}), false, now())
}

/// A streamed, not-yet-persisted assistant chunk.
pub fn assistant_chunk(thread_id: &str, content: &str, sequence: u64) -> ResponseItem {
    ResponseItem::new(
        thread_id,
        ItemType::Assistant,
        json!({"content": content}),
        json!({"stream_status": "chunk", "sequence": sequence}),
        true,
        now(),
    )
}

/// The persisted final assistant turn for one cycle.
pub fn assistant_final(thread_id: &str, content: &str, tool_calls: &[ToolCall]) -> ResponseItem {
    ResponseItem::new(
        thread_id,
        ItemType::Assistant,
        json!({
            "content": content,
            "tool_calls": tool_calls.iter().map(|c| json!({
                "id": c.id,
                "function_name": c.function_name,
                "arguments": c.arguments,
            })).collect::<Vec<_>>(),
        }),
        json!({"stream_status": "complete"}),
        true,
    now(),
    )
}

/// A tool-result message fed back to the LLM on the next turn and shown to viewers.
pub fn tool_result(thread_id: &str, call: &ToolCall, result: &ToolResult) -> ResponseItem {
    ResponseItem::new(
        thread_id,
        ItemType::Tool,
        json!({
            "tool_call_id": call.id,
            "function_name": call.function_name,
            "success": result.success,
            "output": result.output,
            "error": result.error,
        }),
        json!({}),
        true,
        now(),
    )
}

/// One-shot record of the reconstructed provider response for a whole cycle.
pub fn assistant_response_end(
    thread_id: &str,
    content: &str,
    tool_calls: &[ToolCall],
    model: Option<&str>,
    usage: Option<&LlmUsage>,
    finish_reason: Option<&str>,
) -> ResponseItem {
    ResponseItem::new(
        thread_id,
        ItemType::AssistantResponseEnd,
        json!({
            "content": content,
            "tool_calls": tool_calls.iter().map(|c| &c.function_name).collect::<Vec<_>>(),
            "model": model,
            "usage": usage,
            "finish_reason": finish_reason,
        }),
        json!({}),
        false,
        now(),
    )
}
