//! Agent-run orchestration substrate: the streaming response processor, the
//! run lifecycle and fan-out primitives, and the trigger-to-execution
//! bridge.
//!
//! This crate has no HTTP surface, no sandbox provider, and no LLM SDK of its
//! own — those are external collaborators whose contracts are modelled as
//! traits ([`tools::Tool`], [`llm::LlmChunkStream`], [`worker::LlmClient`]).

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod fanout;
pub mod items;
pub mod llm;
pub mod message;
pub mod processor;
pub mod registry;
pub mod tools;
pub mod trigger;
pub mod worker;
pub mod workflow;
pub mod xml;

pub use error::CoreError;
pub use message::{Message, ToolCall, ToolExecutionContext, ToolOutput, ToolResult};
pub use processor::{ProcessorConfig, ResponseProcessor};
pub use tools::{Tool, ToolRegistry};
