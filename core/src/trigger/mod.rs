//! Trigger Service (C8): persists trigger specs, validates them against a
//! provider, and turns inbound events into either `ExecuteAgent` or
//! `ExecuteWorkflow` commands.
//!
//! Providers are modelled as a variant with a common capability set
//! (`validate_config`, `setup_trigger`, `teardown_trigger`, `process_event`,
//! `health_check`); the service dispatches on `provider_id`.

pub mod schedule;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::CoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerType {
    Schedule,
    Webhook,
    Event,
}

#[derive(Clone, Debug)]
pub struct Trigger {
    pub trigger_id: String,
    pub agent_id: String,
    pub provider_id: String,
    pub trigger_type: TriggerType,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct TriggerEvent {
    pub trigger_id: String,
    pub agent_id: String,
    pub event_type: String,
    pub raw_data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct TriggerResult {
    pub success: bool,
    pub should_execute_agent: bool,
    pub should_execute_workflow: bool,
    pub agent_prompt: Option<String>,
    pub workflow_id: Option<String>,
    pub workflow_input: Option<Value>,
    pub execution_variables: Value,
    pub error_message: Option<String>,
}

impl TriggerResult {
    pub fn agent(prompt: impl Into<String>) -> Self {
        Self { success: true, should_execute_agent: true, agent_prompt: Some(prompt.into()), ..Default::default() }
    }

    pub fn workflow(workflow_id: impl Into<String>, input: Value) -> Self {
        Self {
            success: true,
            should_execute_workflow: true,
            workflow_id: Some(workflow_id.into()),
            workflow_input: Some(input),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, error_message: Some(message.into()), ..Default::default() }
    }
}

/// The capability set every trigger provider implements.
#[async_trait]
pub trait TriggerProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    fn validate_config(&self, config: &Value) -> Result<(), CoreError>;
    /// Binds the trigger to the provider's delivery mechanism; the returned
    /// JSON is merged into the trigger's stored config (e.g. a schedule id).
    async fn setup_trigger(&self, trigger: &Trigger) -> Result<Value, CoreError>;
    async fn teardown_trigger(&self, trigger: &Trigger) -> Result<(), CoreError>;
    async fn process_event(&self, trigger: &Trigger, event: &TriggerEvent) -> TriggerResult;
    async fn health_check(&self, trigger: &Trigger) -> Result<(), CoreError>;
}

/// Durable record of one processed event, for audit and debugging.
#[async_trait]
pub trait TriggerEventLog: Send + Sync {
    async fn record(&self, trigger_id: &str, event: &TriggerEvent, result: &TriggerResult) -> Result<(), CoreError>;
}

/// Resolves a trigger record by id, for webhook ingress (the path is opaque
/// per trigger, so the handler has nothing but the id to go on).
#[async_trait]
pub trait TriggerLookup: Send + Sync {
    async fn get(&self, trigger_id: &str) -> Result<Trigger, CoreError>;
}

fn merge_json(base: &mut Value, patch: Value) {
    if let Value::Object(patch_map) = patch {
        if let Value::Object(base_map) = base {
            base_map.extend(patch_map);
        }
    }
}

/// The façade dispatching to a registered [`TriggerProvider`] by `provider_id`.
pub struct TriggerService {
    providers: HashMap<String, Arc<dyn TriggerProvider>>,
    event_log: Arc<dyn TriggerEventLog>,
}

impl TriggerService {
    pub fn new(event_log: Arc<dyn TriggerEventLog>) -> Self {
        Self { providers: HashMap::new(), event_log }
    }

    pub fn register_provider(&mut self, provider: Arc<dyn TriggerProvider>) {
        self.providers.insert(provider.provider_id().to_string(), provider);
    }

    fn provider(&self, provider_id: &str) -> Result<&Arc<dyn TriggerProvider>, CoreError> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| CoreError::Configuration(format!("unknown trigger provider: {provider_id}")))
    }

    pub async fn create(&self, mut trigger: Trigger) -> Result<Trigger, CoreError> {
        let provider = self.provider(&trigger.provider_id)?;
        provider.validate_config(&trigger.config)?;
        let provider_state = provider.setup_trigger(&trigger).await?;
        merge_json(&mut trigger.config, provider_state);
        trigger.is_active = true;
        Ok(trigger)
    }

    /// A config change or reactivation tears the binding down before setting
    /// it up again; setup failure aborts the update (lifecycle guarantees).
    pub async fn update(
        &self,
        mut trigger: Trigger,
        config_changed: bool,
        reactivating: bool,
    ) -> Result<Trigger, CoreError> {
        let provider = self.provider(&trigger.provider_id)?;
        if config_changed || reactivating {
            provider.teardown_trigger(&trigger).await?;
            provider.validate_config(&trigger.config)?;
            let provider_state = provider.setup_trigger(&trigger).await?;
            merge_json(&mut trigger.config, provider_state);
        }
        trigger.is_active = true;
        Ok(trigger)
    }

    /// Tears down the provider binding before the caller removes the record.
    pub async fn delete(&self, trigger: &Trigger) -> Result<(), CoreError> {
        let provider = self.provider(&trigger.provider_id)?;
        provider.teardown_trigger(trigger).await
    }

    pub async fn process_event(&self, trigger: &Trigger, event: TriggerEvent) -> Result<TriggerResult, CoreError> {
        let provider = self.provider(&trigger.provider_id)?;
        let result = provider.process_event(trigger, &event).await;
        if let Err(err) = self.event_log.record(&trigger.trigger_id, &event, &result).await {
            tracing::warn!(trigger_id = %trigger.trigger_id, error = %err, "trigger event log write failed");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct AcceptAllProvider {
        teardown_calls: Mutex<u32>,
        setup_calls: Mutex<u32>,
    }

    #[async_trait]
    impl TriggerProvider for AcceptAllProvider {
        fn provider_id(&self) -> &str {
            "accept-all"
        }
        fn validate_config(&self, _config: &Value) -> Result<(), CoreError> {
            Ok(())
        }
        async fn setup_trigger(&self, _trigger: &Trigger) -> Result<Value, CoreError> {
            *self.setup_calls.lock().unwrap() += 1;
            Ok(json!({"bound": true}))
        }
        async fn teardown_trigger(&self, _trigger: &Trigger) -> Result<(), CoreError> {
            *self.teardown_calls.lock().unwrap() += 1;
            Ok(())
        }
        async fn process_event(&self, _trigger: &Trigger, _event: &TriggerEvent) -> TriggerResult {
            TriggerResult::agent("hi")
        }
        async fn health_check(&self, _trigger: &Trigger) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct NoopEventLog;
    #[async_trait]
    impl TriggerEventLog for NoopEventLog {
        async fn record(&self, _trigger_id: &str, _event: &TriggerEvent, _result: &TriggerResult) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn trigger(config: Value) -> Trigger {
        Trigger {
            trigger_id: "trig-1".into(),
            agent_id: "agent-1".into(),
            provider_id: "accept-all".into(),
            trigger_type: TriggerType::Webhook,
            name: "t".into(),
            description: None,
            is_active: false,
            config,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_merges_provider_state_into_config_and_activates() {
        let mut service = TriggerService::new(Arc::new(NoopEventLog));
        service.register_provider(Arc::new(AcceptAllProvider {
            teardown_calls: Mutex::new(0),
            setup_calls: Mutex::new(0),
        }));
        let created = service.create(trigger(json!({"a": 1}))).await.unwrap();
        assert!(created.is_active);
        assert_eq!(created.config["bound"], true);
        assert_eq!(created.config["a"], 1);
    }

    #[tokio::test]
    async fn update_with_config_change_tears_down_before_setting_up() {
        let provider = Arc::new(AcceptAllProvider { teardown_calls: Mutex::new(0), setup_calls: Mutex::new(0) });
        let mut service = TriggerService::new(Arc::new(NoopEventLog));
        service.register_provider(provider.clone());
        service.update(trigger(json!({})), true, false).await.unwrap();
        assert_eq!(*provider.teardown_calls.lock().unwrap(), 1);
        assert_eq!(*provider.setup_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn update_without_config_change_skips_rebind() {
        let provider = Arc::new(AcceptAllProvider { teardown_calls: Mutex::new(0), setup_calls: Mutex::new(0) });
        let mut service = TriggerService::new(Arc::new(NoopEventLog));
        service.register_provider(provider.clone());
        service.update(trigger(json!({})), false, false).await.unwrap();
        assert_eq!(*provider.teardown_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_provider_id_is_a_configuration_error() {
        let service = TriggerService::new(Arc::new(NoopEventLog));
        let mut t = trigger(json!({}));
        t.provider_id = "nope".into();
        assert!(service.create(t).await.is_err());
    }
}
