//! LLM transport contract (external interface).
//!
//! The orchestration substrate never talks to a provider SDK directly; it
//! consumes this normalised chunk shape. Each provider adapter (OpenAI,
//! Anthropic, Bedrock, …) is a thin translation layer the substrate doesn't
//! specify — only the contract those adapters must satisfy.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Token accounting for one LLM turn. Fields are `Option` so that a reported
/// zero (e.g. `completion_tokens: 0`) stays distinct from "the provider never
/// reported usage at all".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl LlmUsage {
    pub fn is_complete(&self) -> bool {
        self.prompt_tokens.is_some() && self.completion_tokens.is_some()
    }
}

/// One fragment of a native (provider-form) tool call, keyed by `index` so
/// multiple deltas for the same call can be merged in arrival order.
#[derive(Clone, Debug, Default)]
pub struct NativeToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub function_name: Option<String>,
    pub arguments_delta: Option<String>,
}

/// A normalised LLM stream chunk. Duck-typed in the source systems this is
/// modelled on; here it is a struct with optional fields populated by a
/// per-provider adapter, per the Design Notes' "normalised struct" guidance.
#[derive(Clone, Debug, Default)]
pub struct LlmChunk {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_call_deltas: Vec<NativeToolCallDelta>,
    pub finish_reason: Option<String>,
    pub usage: Option<LlmUsage>,
    pub model: Option<String>,
    pub created: Option<i64>,
}

/// An async stream of chunks from one LLM call.
pub type LlmChunkStream = Pin<Box<dyn Stream<Item = Result<LlmChunk, CoreError>> + Send>>;

/// A complete, non-streaming LLM response.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<crate::message::ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<LlmUsage>,
    pub model: Option<String>,
    pub created: Option<i64>,
}
