//! Local development entrypoint: wires the HTTP surface to in-memory
//! stand-ins for every external collaborator (message store, sandbox
//! provisioner, run queue, trigger lookup). Not a production deployment —
//! there is no real LLM, sandbox, or persistence behind this binary, only
//! enough plumbing to exercise the two routes by hand.

use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use runloom_core::bridge::{AgentVersion, AgentVersionStore, ExecutionBridge, RunQueue, SandboxHandle, SandboxProvisioner, ThreadRecords};
use runloom_core::buffer::ResponseBuffer;
use runloom_core::config::Settings;
use runloom_core::error::CoreError;
use runloom_core::fanout::{RunLifecycleReader, RunLifecycleStatus, StreamFanout, ViewAuthorization};
use runloom_core::registry::RunRegistry;
use runloom_core::trigger::{Trigger, TriggerEvent, TriggerEventLog, TriggerLookup, TriggerResult, TriggerService};
use runloom_core::worker::{RunRequest, RunStatus, RunStatusStore};
use runloom_core::workflow::{Step, WorkflowStore};
use runloom_wire::ResponseItem;

struct DevAgentVersions;
#[async_trait]
impl AgentVersionStore for DevAgentVersions {
    async fn fetch(&self, agent_id: &str) -> Result<AgentVersion, CoreError> {
        Ok(AgentVersion { agent_id: agent_id.to_string(), system_prompt: "You are a helpful agent.".into(), configured_tools: vec![], mcp_enabled_tools: vec![] })
    }
}

struct DevThreadRecords;
#[async_trait]
impl ThreadRecords for DevThreadRecords {
    async fn create_project_and_thread(&self, _agent_id: &str) -> Result<(String, String), CoreError> {
        Ok((Uuid::new_v4().to_string(), Uuid::new_v4().to_string()))
    }
    async fn insert_user_message(&self, thread_id: &str, content: &str) -> Result<(), CoreError> {
        tracing::info!(thread_id, content, "dev: would insert user message");
        Ok(())
    }
}

struct DevSandbox;
#[async_trait]
impl SandboxProvisioner for DevSandbox {
    async fn provision(&self, _project_id: &str) -> Result<SandboxHandle, CoreError> {
        Ok(SandboxHandle { sandbox_id: Uuid::new_v4().to_string(), preview_urls: vec![] })
    }
}

struct DevRunStatusStore;
#[async_trait]
impl RunStatusStore for DevRunStatusStore {
    async fn create(&self, run_id: &str, thread_id: &str) -> Result<(), CoreError> {
        tracing::info!(run_id, thread_id, "dev: run created");
        Ok(())
    }
    async fn finalize(&self, run_id: &str, status: RunStatus, error: Option<&str>, _items: &[ResponseItem]) -> Result<(), CoreError> {
        tracing::info!(run_id, ?status, error, "dev: run finalized");
        Ok(())
    }
}

struct DevQueue;
#[async_trait]
impl RunQueue for DevQueue {
    async fn enqueue(&self, request: RunRequest) -> Result<(), CoreError> {
        tracing::info!(run_id = %request.run_id, "dev: run enqueued, no worker pool attached in this binary");
        Ok(())
    }
}

struct NoTriggersConfigured;
#[async_trait]
impl TriggerLookup for NoTriggersConfigured {
    async fn get(&self, trigger_id: &str) -> Result<Trigger, CoreError> {
        Err(CoreError::Configuration(format!("no trigger registered: {trigger_id}")))
    }
}

struct DevEventLog;
#[async_trait]
impl TriggerEventLog for DevEventLog {
    async fn record(&self, trigger_id: &str, _event: &TriggerEvent, result: &TriggerResult) -> Result<(), CoreError> {
        tracing::info!(trigger_id, success = result.success, "dev: trigger event recorded");
        Ok(())
    }
}

struct NoWorkflowsConfigured;
#[async_trait]
impl WorkflowStore for NoWorkflowsConfigured {
    async fn load(&self, workflow_id: &str) -> Result<Vec<Step>, CoreError> {
        Err(CoreError::Configuration(format!("no workflow registered: {workflow_id}")))
    }
}

struct AllowAllViewers;
#[async_trait]
impl ViewAuthorization for AllowAllViewers {
    async fn can_view(&self, _run_id: &str) -> Result<bool, CoreError> {
        Ok(true)
    }
}

struct AlwaysRunning;
#[async_trait]
impl RunLifecycleReader for AlwaysRunning {
    async fn status(&self, _run_id: &str) -> Result<RunLifecycleStatus, CoreError> {
        Ok(RunLifecycleStatus::Running)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::load();
    let buffer = ResponseBuffer::new();

    let bridge = Arc::new(ExecutionBridge::new(
        settings.instance_id.clone(),
        settings.active_run_ttl.as_secs(),
        Arc::new(DevAgentVersions),
        Arc::new(DevThreadRecords),
        Arc::new(DevSandbox),
        Arc::new(DevRunStatusStore),
        RunRegistry::new(),
        Arc::new(DevQueue),
    ));

    let mut trigger_service = TriggerService::new(Arc::new(DevEventLog));
    trigger_service.register_provider(Arc::new(runloom_core::trigger::webhook::WebhookProvider));

    let state = runloom_serve::AppState {
        buffer: buffer.clone(),
        fanout: Arc::new(StreamFanout::new(buffer, Arc::new(AllowAllViewers), Arc::new(AlwaysRunning))),
        triggers: Arc::new(NoTriggersConfigured),
        trigger_service: Arc::new(trigger_service),
        workflows: Arc::new(NoWorkflowsConfigured),
        bridge,
    };

    runloom_serve::run_serve(&settings.bind_addr, state).await
}
