//! Response Processor (C5): turns one LLM response, streaming or whole, into
//! the persisted `ResponseItem` sequence, dispatching and integrating tool
//! calls along the way.
//!
//! The streaming path is `Init -> Started -> Streaming -> Draining ->
//! Finalising -> Ended`; see [`run_streaming_cycle`]. The non-streaming path
//! ([`run_non_streaming`]) emits the same terminal shape without the
//! streaming-only transitions.

pub mod config;
pub mod native;
pub mod state;

use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::mpsc;

use runloom_wire::ResponseItem;

use crate::error::CoreError;
use crate::llm::{LlmChunkStream, LlmResponse, LlmUsage};
use crate::message::{Message, ToolCall, ToolExecutionContext, ToolResult};
use crate::tools::ToolRegistry;
use crate::xml;
use crate::{items, message};

pub use config::{ProcessorConfig, ToolExecutionStrategy, XmlAddingStrategy};
pub use native::NativeToolCallAccumulator;
pub use state::ContinuousState;

/// Everything one [`ResponseProcessor::run_streaming_cycle`] call needs that
/// isn't the chunk stream itself.
pub struct CycleInput {
    pub thread_id: String,
    pub thread_run_id: String,
    /// The prompt history sent to the LLM, used only to estimate token usage
    /// when the provider doesn't report it.
    pub prompt_history: Vec<Message>,
    /// `None` on the first cycle of a run; `Some` when resuming after a
    /// `length` finish reason.
    pub continuous_state: Option<ContinuousState>,
    /// Whether a further auto-continue would exceed the worker's cycle cap;
    /// when true, a `length` finish reason is treated as a normal stop.
    pub is_last_allowed_cycle: bool,
}

/// What a cycle produced, beyond the items already sent down `emit`.
pub struct CycleOutcome {
    pub should_auto_continue: bool,
    pub continuous_state: Option<ContinuousState>,
    pub agent_should_terminate: bool,
    /// Whether this cycle emitted `thread_run_end` (false while auto-continuing).
    pub ended: bool,
    /// The persisted assistant turn, for the worker to fold into history.
    pub assistant_message: Option<Message>,
    /// Tool-result messages, for the worker to fold into history.
    pub tool_result_messages: Vec<Message>,
}

struct RunningTool {
    context: ToolExecutionContext,
    handle: tokio::task::JoinHandle<ToolResult>,
}

fn estimate_tokens(text: &str) -> u32 {
    // Rough, provider-agnostic fallback: ~4 bytes per token.
    if text.is_empty() {
        0
    } else {
        ((text.len() as u32) / 4).max(1)
    }
}

#[derive(Clone)]
pub struct ResponseProcessor {
    config: ProcessorConfig,
    tools: ToolRegistry,
}

impl ResponseProcessor {
    pub fn new(config: ProcessorConfig, tools: ToolRegistry) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config, tools })
    }

    pub fn config_snapshot(&self) -> &ProcessorConfig {
        &self.config
    }

    fn spawn_tool(&self, call: ToolCall, tool_index: usize) -> RunningTool {
        let tools = self.tools.clone();
        let context = ToolExecutionContext::new(call.clone(), tool_index);
        let handle = tokio::spawn(async move { tools.invoke(&call.function_name, &call.arguments).await });
        RunningTool { context, handle }
    }

    /// Drives one streaming LLM call through the full state machine,
    /// publishing every `ResponseItem` on `emit` as it becomes available.
    pub async fn run_streaming_cycle(
        &self,
        input: CycleInput,
        mut chunks: LlmChunkStream,
        emit: mpsc::Sender<ResponseItem>,
    ) -> Result<CycleOutcome, CoreError> {
        let is_continuation = input.continuous_state.is_some();
        let mut cont = input.continuous_state.unwrap_or_else(|| ContinuousState::first_cycle(&input.thread_run_id));

        if !is_continuation {
            let _ = emit.send(items::thread_run_start(&input.thread_id, &input.thread_run_id)).await;
            let _ = emit.send(items::assistant_response_start(&input.thread_id)).await;
        }

        let mut accumulated_content = std::mem::take(&mut cont.accumulated_content);
        let mut sequence = cont.sequence;
        let mut xml_accepted = cont.xml_calls_accepted;
        let mut next_tool_index = cont.next_tool_index;
        let mut xml_scanned_upto = accumulated_content.len();

        let mut native_acc = NativeToolCallAccumulator::new();
        let mut running_tools: Vec<RunningTool> = Vec::new();
        let mut deferred_calls: Vec<(ToolCall, Option<serde_json::Value>)> = Vec::new();
        let mut native_calls_seen: HashMap<String, ()> = HashMap::new();
        let mut native_tool_calls: Vec<ToolCall> = Vec::new();

        let mut model: Option<String> = None;
        let mut usage: Option<LlmUsage> = None;
        let mut created: Option<i64> = None;
        let mut finish_reason: Option<String> = None;
        let mut should_auto_continue = false;
        let mut xml_cap_tripped = false;
        let mut xml_cutoff: Option<usize> = None;
        let mut terminating_seen = false;

        'streaming: while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;

            if chunk.model.is_some() {
                model = chunk.model.clone();
            }
            if chunk.created.is_some() {
                created = chunk.created;
            }
            if chunk.usage.is_some() {
                usage = chunk.usage.clone();
            }

            if let Some(reasoning) = &chunk.reasoning_content {
                accumulated_content.push_str(reasoning);
            }

            if let Some(content) = &chunk.content {
                accumulated_content.push_str(content);
                sequence += 1;
                let _ = emit.send(items::assistant_chunk(&input.thread_id, content, sequence)).await;
            }

            if self.config.xml_tool_calling && !xml_cap_tripped && !terminating_seen {
                let suffix = &accumulated_content[xml_scanned_upto..];
                let blocks = xml::find_complete_blocks(suffix);
                let mut advance_to = None;
                for block in &blocks {
                    advance_to = Some(xml_scanned_upto + block.end);
                    for (call, details) in xml::parse_block_with_details(block.raw_xml) {
                        if self.config.xml_cap_reached(xml_accepted) {
                            xml_cap_tripped = true;
                            finish_reason = Some("xml_tool_limit_reached".into());
                            break;
                        }
                        xml_accepted += 1;
                        if !self.config.execute_tools {
                            continue;
                        }
                        let is_terminating = call.is_terminating();
                        let tool_index = next_tool_index;
                        next_tool_index += 1;
                        let _ = emit.send(items::tool_started(&input.thread_id, tool_index, &call)).await;
                        if self.config.execute_on_stream {
                            let mut running = self.spawn_tool(call, tool_index);
                            running.context.parsing_details = Some(details);
                            running_tools.push(running);
                        } else {
                            deferred_calls.push((call, Some(details)));
                        }
                        if is_terminating {
                            terminating_seen = true;
                            break;
                        }
                    }
                    if xml_cap_tripped || terminating_seen {
                        xml_cutoff = advance_to;
                        break;
                    }
                }
                if let Some(pos) = advance_to {
                    xml_scanned_upto = pos;
                }
            }

            if self.config.native_tool_calling && !terminating_seen {
                for delta in &chunk.tool_call_deltas {
                    native_acc.ingest(delta);
                }
                if !chunk.tool_call_deltas.is_empty() {
                    let _ = emit
                        .send(runloom_wire::ResponseItem::new(
                            &input.thread_id,
                            runloom_wire::ItemType::Status,
                            serde_json::json!({"status_type": "tool_call_chunk"}),
                            serde_json::json!({}),
                            false,
                            chrono::Utc::now().to_rfc3339(),
                        ))
                        .await;
                }
                for call in native_acc.drain_complete() {
                    if native_calls_seen.contains_key(&call.uid) {
                        continue;
                    }
                    native_calls_seen.insert(call.uid.clone(), ());
                    native_tool_calls.push(call.clone());
                    if !self.config.execute_tools {
                        continue;
                    }
                    let is_terminating = call.is_terminating();
                    let tool_index = next_tool_index;
                    next_tool_index += 1;
                    let _ = emit.send(items::tool_started(&input.thread_id, tool_index, &call)).await;
                    if self.config.execute_on_stream {
                        running_tools.push(self.spawn_tool(call, tool_index));
                    } else {
                        deferred_calls.push((call, None));
                    }
                    if is_terminating {
                        terminating_seen = true;
                        break;
                    }
                }
            }

            if let Some(reason) = &chunk.finish_reason {
                finish_reason = Some(reason.clone());
                if reason == "length" && !input.is_last_allowed_cycle {
                    should_auto_continue = true;
                    break 'streaming;
                }
                break 'streaming;
            }
        }

        // Draining: await every pending tool task.
        let mut agent_should_terminate = false;
        let mut tool_result_messages = Vec::new();

        if !should_auto_continue {
            for call in native_acc.finalize_all_lenient() {
                if native_calls_seen.contains_key(&call.uid) || terminating_seen {
                    continue;
                }
                native_tool_calls.push(call.clone());
                if !self.config.execute_tools {
                    continue;
                }
                let tool_index = next_tool_index;
                next_tool_index += 1;
                let _ = emit.send(items::tool_started(&input.thread_id, tool_index, &call)).await;
                running_tools.push(self.spawn_tool(call, tool_index));
            }

            for running in running_tools {
                let RunningTool { mut context, handle } = running;
                let result = match handle.await {
                    Ok(result) => result,
                    Err(join_err) => ToolResult::failure(format!("tool task panicked: {join_err}")),
                };
                let terminated_this_call =
                    self.finish_tool(&input.thread_id, &mut context, result, &emit, &mut tool_result_messages).await;
                if terminated_this_call {
                    agent_should_terminate = true;
                }
            }

            for (call, _details) in deferred_calls {
                if !self.config.execute_tools {
                    continue;
                }
                let tool_index = next_tool_index;
                next_tool_index += 1;
                let mut context = ToolExecutionContext::new(call.clone(), tool_index);
                let result = self.tools.invoke(&call.function_name, &call.arguments).await;
                let terminated_this_call =
                    self.finish_tool(&input.thread_id, &mut context, result, &emit, &mut tool_result_messages).await;
                if terminated_this_call {
                    agent_should_terminate = true;
                }
            }
        }

        if should_auto_continue {
            let next_state = ContinuousState {
                accumulated_content,
                sequence,
                cycles_so_far: cont.cycles_so_far + 1,
                thread_run_id: input.thread_run_id,
                xml_calls_accepted: xml_accepted,
                next_tool_index,
            };
            return Ok(CycleOutcome {
                should_auto_continue: true,
                continuous_state: Some(next_state),
                agent_should_terminate: false,
                ended: false,
                assistant_message: None,
                tool_result_messages: Vec::new(),
            });
        }

        // Finalising.
        let persisted_content = match xml_cutoff {
            Some(pos) => accumulated_content[..pos].to_string(),
            None => accumulated_content.clone(),
        };

        let assistant_message = Message::assistant(persisted_content.clone(), native_tool_calls.clone());
        let _ = emit
            .send(items::assistant_final(&input.thread_id, &persisted_content, &native_tool_calls))
            .await;

        if agent_should_terminate {
            let _ = emit.send(items::finish(&input.thread_id, "agent_terminated")).await;
            let _ = emit
                .send(items::assistant_response_end(
                    &input.thread_id,
                    &persisted_content,
                    &native_tool_calls,
                    model.as_deref(),
                    usage.as_ref(),
                    Some("agent_terminated"),
                ))
                .await;
            let _ = emit.send(items::thread_run_end(&input.thread_id)).await;
            return Ok(CycleOutcome {
                should_auto_continue: false,
                continuous_state: None,
                agent_should_terminate: true,
                ended: true,
                assistant_message: Some(assistant_message),
                tool_result_messages,
            });
        }

        let usage = usage.or_else(|| {
            let prompt_text: String =
                input.prompt_history.iter().map(message_text).collect::<Vec<_>>().join("\n");
            Some(LlmUsage {
                prompt_tokens: Some(estimate_tokens(&prompt_text)),
                completion_tokens: Some(estimate_tokens(&persisted_content)),
                total_tokens: Some(estimate_tokens(&prompt_text) + estimate_tokens(&persisted_content)),
            })
        });

        let final_reason = finish_reason.unwrap_or_else(|| "stop".into());
        let _ = emit.send(items::finish(&input.thread_id, &final_reason)).await;
        let _ = emit
            .send(items::assistant_response_end(
                &input.thread_id,
                &persisted_content,
                &native_tool_calls,
                model.as_deref(),
                usage.as_ref(),
                Some(&final_reason),
            ))
            .await;
        let _ = emit.send(items::thread_run_end(&input.thread_id)).await;

        Ok(CycleOutcome {
            should_auto_continue: false,
            continuous_state: None,
            agent_should_terminate: false,
            ended: true,
            assistant_message: Some(assistant_message),
            tool_result_messages,
        })
    }

    /// Awaits one tool's outcome, emits its terminal status and result
    /// message, and reports whether it was a terminating tool.
    async fn finish_tool(
        &self,
        thread_id: &str,
        context: &mut ToolExecutionContext,
        result: ToolResult,
        emit: &mpsc::Sender<ResponseItem>,
        tool_result_messages: &mut Vec<Message>,
    ) -> bool {
        let call = context.tool_call.clone();
        let status_item = if result.success {
            items::tool_completed(thread_id, context.tool_index, &call)
        } else if result.error.as_deref().map(|e| e.starts_with("tool task panicked")).unwrap_or(false) {
            items::tool_error(thread_id, context.tool_index, &call, result.error.as_deref().unwrap_or(""))
        } else {
            items::tool_failed(thread_id, context.tool_index, &call, result.error.as_deref().unwrap_or(""))
        };
        let _ = emit.send(status_item).await;
        let _ = emit.send(items::tool_result(thread_id, &call, &result)).await;
        tool_result_messages.push(message::Message::tool(call.id.clone(), summarize_output(&result)));
        context.result = Some(result);
        call.is_terminating()
    }

    /// Non-streaming mode: emits the same terminal item shape from a
    /// whole response, with no streaming-only transitions.
    pub async fn run_non_streaming(
        &self,
        thread_id: &str,
        thread_run_id: &str,
        response: LlmResponse,
        emit: mpsc::Sender<ResponseItem>,
    ) -> Result<CycleOutcome, CoreError> {
        let _ = emit.send(items::thread_run_start(thread_id, thread_run_id)).await;

        let mut xml_calls = Vec::new();
        if self.config.xml_tool_calling {
            for block in xml::find_complete_blocks(&response.content) {
                xml_calls.extend(xml::parse_block(block.raw_xml));
            }
        }
        let mut all_calls = response.tool_calls.clone();
        all_calls.extend(xml_calls);

        let _ = emit
            .send(items::assistant_final(thread_id, &response.content, &response.tool_calls))
            .await;
        let assistant_message = Message::assistant(response.content.clone(), response.tool_calls.clone());

        let mut agent_should_terminate = false;
        let mut tool_result_messages = Vec::new();

        if self.config.execute_tools {
            for (i, call) in all_calls.into_iter().enumerate() {
                if agent_should_terminate {
                    break;
                }
                let _ = emit.send(items::tool_started(thread_id, i, &call)).await;
                let result = self.tools.invoke(&call.function_name, &call.arguments).await;
                let mut context = ToolExecutionContext::new(call, i);
                let terminated =
                    self.finish_tool(thread_id, &mut context, result, &emit, &mut tool_result_messages).await;
                agent_should_terminate |= terminated;
            }
        }

        let final_reason = if agent_should_terminate {
            "agent_terminated"
        } else {
            response.finish_reason.as_deref().unwrap_or("stop")
        };
        let _ = emit.send(items::finish(thread_id, final_reason)).await;
        let _ = emit
            .send(items::assistant_response_end(
                thread_id,
                &response.content,
                &response.tool_calls,
                response.model.as_deref(),
                response.usage.as_ref(),
                Some(final_reason),
            ))
            .await;
        let _ = emit.send(items::thread_run_end(thread_id)).await;

        Ok(CycleOutcome {
            should_auto_continue: false,
            continuous_state: None,
            agent_should_terminate,
            ended: true,
            assistant_message: Some(assistant_message),
            tool_result_messages,
        })
    }
}

fn message_text(message: &Message) -> String {
    match message {
        Message::System { content } | Message::User { content } | Message::Assistant { content, .. } => {
            content.clone()
        }
        Message::Tool { content, .. } => content.clone(),
    }
}

fn summarize_output(result: &ToolResult) -> String {
    match &result.output {
        message::ToolOutput::Text(text) => text.clone(),
        message::ToolOutput::Structured(value) => value.to_string(),
    }
}
