//! Run Worker (C6): drives one agent run end to end — builds the prompt,
//! invokes the LLM, feeds the Response Processor, appends items to the
//! buffer, handles auto-continue, and finalises the run-status record.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use runloom_wire::ResponseItem;

use crate::buffer::{ControlSignal, ResponseBuffer};
use crate::error::CoreError;
use crate::items;
use crate::llm::LlmChunkStream;
use crate::message::Message;
use crate::processor::{CycleInput, ResponseProcessor};
use crate::registry::RunRegistry;

/// The terminal run-status values, plus `Running` for the in-flight
/// record written at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stopped,
    AgentTerminated,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
            RunStatus::AgentTerminated => "agent_terminated",
        }
    }
}

/// The LLM transport collaborator: opens a fresh chunk stream for the
/// given prompt history. Retrying, fallback providers, and billing are the
/// caller's concern, not the worker's.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn stream(&self, history: &[Message]) -> Result<LlmChunkStream, CoreError>;
}

/// The message-store collaborator: durable persistence of a response item,
/// independent of the (TTL-bounded, in-memory) response buffer.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn add_message(&self, thread_id: &str, item: &ResponseItem) -> Result<(), CoreError>;
}

/// The run-status record collaborator.
#[async_trait]
pub trait RunStatusStore: Send + Sync {
    /// Inserts the initial `running` record; called by the Execution Bridge
    /// before the run is handed to a worker.
    async fn create(&self, run_id: &str, thread_id: &str) -> Result<(), CoreError>;

    async fn finalize(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<&str>,
        items: &[ResponseItem],
    ) -> Result<(), CoreError>;
}

#[derive(Clone, Debug)]
pub struct RunWorkerConfig {
    pub instance_id: String,
    pub active_run_ttl_seconds: u64,
}

pub struct RunRequest {
    pub run_id: String,
    pub thread_id: String,
    pub initial_history: Vec<Message>,
}

pub struct RunWorker {
    config: RunWorkerConfig,
    processor: ResponseProcessor,
    buffer: ResponseBuffer,
    registry: RunRegistry,
    llm: Arc<dyn LlmClient>,
    message_store: Arc<dyn MessageStore>,
    run_status_store: Arc<dyn RunStatusStore>,
}

impl RunWorker {
    pub fn new(
        config: RunWorkerConfig,
        processor: ResponseProcessor,
        buffer: ResponseBuffer,
        registry: RunRegistry,
        llm: Arc<dyn LlmClient>,
        message_store: Arc<dyn MessageStore>,
        run_status_store: Arc<dyn RunStatusStore>,
    ) -> Self {
        Self { config, processor, buffer, registry, llm, message_store, run_status_store }
    }

    async fn append_and_persist(&self, request: &RunRequest, item: ResponseItem, all_items: &mut Vec<ResponseItem>) {
        self.buffer.append(&request.run_id, item.clone());
        if let Err(err) = self.message_store.add_message(&request.thread_id, &item).await {
            tracing::warn!(run_id = %request.run_id, error = %err, "durable message write failed");
        }
        all_items.push(item);
    }

    /// Drives the run to a terminal status, per the C6 operation sequence.
    pub async fn drive(&self, request: RunRequest) -> RunStatus {
        self.registry.register(
            &self.config.instance_id,
            &request.run_id,
            &request.thread_id,
            self.config.active_run_ttl_seconds,
        );
        let mut control_rx = self.buffer.subscribe_control(&request.run_id);

        let thread_run_id = Uuid::new_v4().to_string();
        let mut history = request.initial_history.clone();
        let mut continuous_state = None;
        let mut cycles_run = 0usize;
        let mut all_items: Vec<ResponseItem> = Vec::new();
        let max_cycles = self.processor.config_snapshot().max_auto_continue_cycles;

        let final_status = 'cycles: loop {
            let is_last_allowed_cycle = cycles_run + 1 >= max_cycles;

            let stream = match self.llm.stream(&history).await {
                Ok(stream) => stream,
                Err(err) => {
                    let item = items::error(&request.thread_id, &err.to_string());
                    self.append_and_persist(&request, item, &mut all_items).await;
                    break 'cycles RunStatus::Failed;
                }
            };

            let (tx, mut rx) = mpsc::channel::<ResponseItem>(256);
            let input = CycleInput {
                thread_id: request.thread_id.clone(),
                thread_run_id: thread_run_id.clone(),
                prompt_history: history.clone(),
                continuous_state: continuous_state.take(),
                is_last_allowed_cycle,
            };
            let processor = self.processor.clone();
            let mut cycle_task = tokio::spawn(async move { processor.run_streaming_cycle(input, stream, tx).await });

            enum CycleEnd {
                Finished(Result<Result<crate::processor::CycleOutcome, CoreError>, tokio::task::JoinError>),
                Stopped,
            }

            let cycle_end = loop {
                tokio::select! {
                    received = rx.recv() => {
                        match received {
                            Some(item) => self.append_and_persist(&request, item, &mut all_items).await,
                            None => break CycleEnd::Finished((&mut cycle_task).await),
                        }
                    }
                    signal = control_rx.recv() => {
                        if matches!(signal, Ok(ControlSignal::Stop)) {
                            cycle_task.abort();
                            break CycleEnd::Stopped;
                        }
                    }
                }
            };

            let outcome = match cycle_end {
                CycleEnd::Stopped => {
                    let item = items::finish(&request.thread_id, "stopped");
                    self.append_and_persist(&request, item, &mut all_items).await;
                    break 'cycles RunStatus::Stopped;
                }
                CycleEnd::Finished(Ok(Ok(outcome))) => outcome,
                CycleEnd::Finished(Ok(Err(err))) => {
                    let item = items::error(&request.thread_id, &err.to_string());
                    self.append_and_persist(&request, item, &mut all_items).await;
                    break 'cycles RunStatus::Failed;
                }
                CycleEnd::Finished(Err(_join_err)) => {
                    let item = items::error(&request.thread_id, "run worker task panicked");
                    self.append_and_persist(&request, item, &mut all_items).await;
                    break 'cycles RunStatus::Failed;
                }
            };

            cycles_run += 1;
            if let Some(message) = outcome.assistant_message {
                history.push(message);
            }
            history.extend(outcome.tool_result_messages);

            if outcome.should_auto_continue && !is_last_allowed_cycle {
                continuous_state = outcome.continuous_state;
                continue 'cycles;
            }

            break 'cycles if outcome.agent_should_terminate { RunStatus::AgentTerminated } else { RunStatus::Completed };
        };

        if let Err(err) = self.run_status_store.finalize(&request.run_id, final_status, None, &all_items).await {
            tracing::error!(run_id = %request.run_id, error = %err, "failed to write final run status");
        }
        // The terminal control publish fires regardless, so fan-out viewers detach cleanly.
        self.buffer.publish_control(&request.run_id, ControlSignal::EndStream);
        self.registry.deregister(&self.config.instance_id, &request.run_id);
        self.buffer.delete(&request.run_id);
        final_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorConfig;
    use crate::tools::ToolRegistry;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedLlm {
        cycles: Mutex<Vec<Vec<crate::llm::LlmChunk>>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn stream(&self, _history: &[Message]) -> Result<LlmChunkStream, CoreError> {
            let chunks = self.cycles.lock().unwrap().remove(0);
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    /// Sends its scripted chunks then hangs forever instead of closing the
    /// stream, so a cycle only ends via the control channel, never by
    /// exhausting the chunk source.
    struct HangingLlm {
        chunks: Mutex<Option<Vec<crate::llm::LlmChunk>>>,
    }

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn stream(&self, _history: &[Message]) -> Result<LlmChunkStream, CoreError> {
            let chunks = self.chunks.lock().unwrap().take().unwrap_or_default();
            let (tx, rx) = mpsc::channel::<Result<crate::llm::LlmChunk, CoreError>>(8);
            tokio::spawn(async move {
                for chunk in chunks {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                }
                std::future::pending::<()>().await;
            });
            Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
        }
    }

    struct NoopMessageStore;
    #[async_trait]
    impl MessageStore for NoopMessageStore {
        async fn add_message(&self, _thread_id: &str, _item: &ResponseItem) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct RecordingStatusStore {
        recorded: Mutex<Option<(RunStatus, usize)>>,
    }
    #[async_trait]
    impl RunStatusStore for RecordingStatusStore {
        async fn create(&self, _run_id: &str, _thread_id: &str) -> Result<(), CoreError> {
            Ok(())
        }

        async fn finalize(
            &self,
            _run_id: &str,
            status: RunStatus,
            _error: Option<&str>,
            items: &[ResponseItem],
        ) -> Result<(), CoreError> {
            *self.recorded.lock().unwrap() = Some((status, items.len()));
            Ok(())
        }
    }

    fn content_chunk(text: &str) -> crate::llm::LlmChunk {
        crate::llm::LlmChunk { content: Some(text.to_string()), ..Default::default() }
    }

    fn finish_chunk(reason: &str) -> crate::llm::LlmChunk {
        crate::llm::LlmChunk { finish_reason: Some(reason.to_string()), ..Default::default() }
    }

    #[tokio::test]
    async fn single_cycle_run_completes_and_finalizes() {
        let processor = ResponseProcessor::new(ProcessorConfig::default(), ToolRegistry::new()).unwrap();
        let buffer = ResponseBuffer::new();
        let registry = RunRegistry::new();
        let llm = Arc::new(ScriptedLlm { cycles: Mutex::new(vec![vec![content_chunk("hi"), finish_chunk("stop")]]) });
        let status_store = Arc::new(RecordingStatusStore { recorded: Mutex::new(None) });
        let worker = RunWorker::new(
            RunWorkerConfig { instance_id: "instance-a".into(), active_run_ttl_seconds: 300 },
            processor,
            buffer.clone(),
            registry.clone(),
            llm,
            Arc::new(NoopMessageStore),
            status_store.clone(),
        );

        let request = RunRequest { run_id: "run-1".into(), thread_id: "thread-1".into(), initial_history: vec![] };
        let status = worker.drive(request).await;
        assert_eq!(status, RunStatus::Completed);
        assert!(!registry.is_live_locally("run-1"));
        let (recorded_status, item_count) = status_store.recorded.lock().unwrap().clone().unwrap();
        assert_eq!(recorded_status, RunStatus::Completed);
        assert!(item_count > 0);
    }

    #[tokio::test]
    async fn stop_signal_mid_stream_ends_run_as_stopped() {
        let processor = ResponseProcessor::new(ProcessorConfig::default(), ToolRegistry::new()).unwrap();
        let buffer = ResponseBuffer::new();
        let registry = RunRegistry::new();
        // A stream that never finishes on its own, so the control signal must win the race.
        let llm = Arc::new(HangingLlm {
            chunks: Mutex::new(Some(vec![content_chunk("part one"), content_chunk("part two")])),
        });
        let status_store = Arc::new(RecordingStatusStore { recorded: Mutex::new(None) });
        let worker = RunWorker::new(
            RunWorkerConfig { instance_id: "instance-a".into(), active_run_ttl_seconds: 300 },
            processor,
            buffer.clone(),
            registry,
            llm,
            Arc::new(NoopMessageStore),
            status_store,
        );

        let request = RunRequest { run_id: "run-1".into(), thread_id: "thread-1".into(), initial_history: vec![] };
        let buffer_for_stop = buffer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            buffer_for_stop.publish_control("run-1", ControlSignal::Stop);
        });
        let status = worker.drive(request).await;
        assert_eq!(status, RunStatus::Stopped);
    }
}
