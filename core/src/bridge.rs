//! Execution Bridge (C9): turns a trigger's decision into a queued run.
//! Agent and workflow targets share project/thread/sandbox provisioning;
//! a workflow target additionally renders a step-tree prompt and augments
//! the agent's system prompt for that run only.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;
use crate::message::Message;
use crate::registry::RunRegistry;
use crate::worker::{RunRequest, RunStatusStore};
use crate::workflow::{flatten_tool_names, render_workflow_prompt, Step};

#[derive(Clone, Debug)]
pub struct AgentVersion {
    pub agent_id: String,
    pub system_prompt: String,
    pub configured_tools: Vec<String>,
    pub mcp_enabled_tools: Vec<String>,
}

/// What C9 gets back from provisioning a sandbox: nothing more. The
/// sandbox's internals are never driven from here.
#[derive(Clone, Debug)]
pub struct SandboxHandle {
    pub sandbox_id: String,
    pub preview_urls: Vec<String>,
}

#[async_trait]
pub trait AgentVersionStore: Send + Sync {
    async fn fetch(&self, agent_id: &str) -> Result<AgentVersion, CoreError>;
}

/// Project/thread scaffolding, for traceability, plus the initial message
/// insert — both live in the same durable store as ordinary conversation.
#[async_trait]
pub trait ThreadRecords: Send + Sync {
    async fn create_project_and_thread(&self, agent_id: &str) -> Result<(String, String), CoreError>;
    async fn insert_user_message(&self, thread_id: &str, content: &str) -> Result<(), CoreError>;
}

#[async_trait]
pub trait SandboxProvisioner: Send + Sync {
    async fn provision(&self, project_id: &str) -> Result<SandboxHandle, CoreError>;
}

/// Where the assembled [`RunRequest`] lands for a Run Worker to pick up.
#[async_trait]
pub trait RunQueue: Send + Sync {
    async fn enqueue(&self, request: RunRequest) -> Result<(), CoreError>;
}

pub enum ExecutionTarget {
    Agent { prompt: String },
    Workflow { steps: Vec<Step>, input: Option<Value> },
}

pub struct BridgeOutcome {
    pub run_id: String,
    pub project_id: String,
    pub thread_id: String,
    pub sandbox_id: String,
}

pub struct ExecutionBridge {
    instance_id: String,
    active_run_ttl_seconds: u64,
    agent_versions: Arc<dyn AgentVersionStore>,
    thread_records: Arc<dyn ThreadRecords>,
    sandboxes: Arc<dyn SandboxProvisioner>,
    run_status: Arc<dyn RunStatusStore>,
    registry: RunRegistry,
    queue: Arc<dyn RunQueue>,
}

impl ExecutionBridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: impl Into<String>,
        active_run_ttl_seconds: u64,
        agent_versions: Arc<dyn AgentVersionStore>,
        thread_records: Arc<dyn ThreadRecords>,
        sandboxes: Arc<dyn SandboxProvisioner>,
        run_status: Arc<dyn RunStatusStore>,
        registry: RunRegistry,
        queue: Arc<dyn RunQueue>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            active_run_ttl_seconds,
            agent_versions,
            thread_records,
            sandboxes,
            run_status,
            registry,
            queue,
        }
    }

    pub async fn execute(&self, agent_id: &str, target: ExecutionTarget) -> Result<BridgeOutcome, CoreError> {
        let agent_version = self.agent_versions.fetch(agent_id).await?;
        let (project_id, thread_id) = self.thread_records.create_project_and_thread(agent_id).await?;
        let sandbox = self.sandboxes.provision(&project_id).await?;

        let (user_prompt, system_prompt) = match target {
            ExecutionTarget::Agent { prompt } => (prompt, agent_version.system_prompt.clone()),
            ExecutionTarget::Workflow { steps, input } => {
                let _tool_allow_list = flatten_tool_names(&agent_version.configured_tools, &agent_version.mcp_enabled_tools);
                let mut prompt = render_workflow_prompt(&steps);
                if let Some(input) = &input {
                    prompt.push_str(&format!("\n\nWorkflow input:\n{}", serde_json::to_string_pretty(input).unwrap_or_default()));
                }
                let augmented_system_prompt = format!("{}\n\n{}", agent_version.system_prompt, prompt);
                (prompt, augmented_system_prompt)
            }
        };

        self.thread_records.insert_user_message(&thread_id, &user_prompt).await?;

        let run_id = Uuid::new_v4().to_string();
        self.run_status.create(&run_id, &thread_id).await?;
        self.registry.register(&self.instance_id, &run_id, &thread_id, self.active_run_ttl_seconds);

        let mut initial_history = Vec::new();
        if !system_prompt.is_empty() {
            initial_history.push(Message::system(system_prompt));
        }
        initial_history.push(Message::user(user_prompt));

        self.queue.enqueue(RunRequest { run_id: run_id.clone(), thread_id: thread_id.clone(), initial_history }).await?;

        Ok(BridgeOutcome { run_id, project_id, thread_id, sandbox_id: sandbox.sandbox_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::RunStatus;
    use runloom_wire::ResponseItem;
    use std::sync::Mutex;

    struct FixedAgentVersionStore(AgentVersion);
    #[async_trait]
    impl AgentVersionStore for FixedAgentVersionStore {
        async fn fetch(&self, _agent_id: &str) -> Result<AgentVersion, CoreError> {
            Ok(self.0.clone())
        }
    }

    struct RecordingThreadRecords {
        inserted: Mutex<Vec<String>>,
    }
    #[async_trait]
    impl ThreadRecords for RecordingThreadRecords {
        async fn create_project_and_thread(&self, _agent_id: &str) -> Result<(String, String), CoreError> {
            Ok(("project-1".into(), "thread-1".into()))
        }
        async fn insert_user_message(&self, _thread_id: &str, content: &str) -> Result<(), CoreError> {
            self.inserted.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    struct StaticSandbox;
    #[async_trait]
    impl SandboxProvisioner for StaticSandbox {
        async fn provision(&self, _project_id: &str) -> Result<SandboxHandle, CoreError> {
            Ok(SandboxHandle { sandbox_id: "sandbox-1".into(), preview_urls: vec![] })
        }
    }

    struct NoopRunStatusStore;
    #[async_trait]
    impl RunStatusStore for NoopRunStatusStore {
        async fn create(&self, _run_id: &str, _thread_id: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn finalize(&self, _run_id: &str, _status: RunStatus, _error: Option<&str>, _items: &[ResponseItem]) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct RecordingQueue {
        enqueued: Mutex<Vec<RunRequest>>,
    }
    #[async_trait]
    impl RunQueue for RecordingQueue {
        async fn enqueue(&self, request: RunRequest) -> Result<(), CoreError> {
            self.enqueued.lock().unwrap().push(request);
            Ok(())
        }
    }

    fn agent_version() -> AgentVersion {
        AgentVersion {
            agent_id: "agent-1".into(),
            system_prompt: "You are a helpful agent.".into(),
            configured_tools: vec!["send_email".into()],
            mcp_enabled_tools: vec![],
        }
    }

    fn bridge(queue: Arc<RecordingQueue>, threads: Arc<RecordingThreadRecords>) -> ExecutionBridge {
        ExecutionBridge::new(
            "instance-a",
            300,
            Arc::new(FixedAgentVersionStore(agent_version())),
            threads,
            Arc::new(StaticSandbox),
            Arc::new(NoopRunStatusStore),
            RunRegistry::new(),
            queue,
        )
    }

    #[tokio::test]
    async fn agent_target_enqueues_the_trigger_prompt_verbatim() {
        let queue = Arc::new(RecordingQueue { enqueued: Mutex::new(vec![]) });
        let threads = Arc::new(RecordingThreadRecords { inserted: Mutex::new(vec![]) });
        let outcome = bridge(queue.clone(), threads.clone())
            .execute("agent-1", ExecutionTarget::Agent { prompt: "Daily brief".into() })
            .await
            .unwrap();

        assert_eq!(outcome.thread_id, "thread-1");
        assert_eq!(outcome.sandbox_id, "sandbox-1");
        let enqueued = queue.enqueued.lock().unwrap();
        assert_eq!(enqueued.len(), 1);
        assert!(matches!(&enqueued[0].initial_history[1], Message::User { content } if content == "Daily brief"));
        assert!(matches!(&enqueued[0].initial_history[0], Message::System { content } if content == "You are a helpful agent."));
    }

    #[tokio::test]
    async fn workflow_target_augments_system_prompt_but_not_the_stored_agent_prompt() {
        let queue = Arc::new(RecordingQueue { enqueued: Mutex::new(vec![]) });
        let threads = Arc::new(RecordingThreadRecords { inserted: Mutex::new(vec![]) });
        let steps = vec![Step::Instruction {
            name: "Send report".into(),
            description: None,
            tool: Some("send_email".into()),
            children: vec![],
        }];
        bridge(queue.clone(), threads.clone())
            .execute("agent-1", ExecutionTarget::Workflow { steps, input: None })
            .await
            .unwrap();

        let enqueued = queue.enqueued.lock().unwrap();
        let Message::System { content: system } = &enqueued[0].initial_history[0] else { panic!("expected system message") };
        assert!(system.starts_with("You are a helpful agent."));
        assert!(system.contains("executing a structured workflow"));
    }
}
