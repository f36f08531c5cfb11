//! Webhook provider: no external binding to manage, inbound payloads map
//! directly to an agent execution.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;

use super::{Trigger, TriggerEvent, TriggerProvider, TriggerResult};

pub struct WebhookProvider;

#[async_trait]
impl TriggerProvider for WebhookProvider {
    fn provider_id(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, _config: &Value) -> Result<(), CoreError> {
        Ok(())
    }

    async fn setup_trigger(&self, _trigger: &Trigger) -> Result<Value, CoreError> {
        Ok(serde_json::json!({}))
    }

    async fn teardown_trigger(&self, _trigger: &Trigger) -> Result<(), CoreError> {
        Ok(())
    }

    async fn process_event(&self, _trigger: &Trigger, event: &TriggerEvent) -> TriggerResult {
        TriggerResult::agent(format!("Process webhook data: {}", event.raw_data))
    }

    async fn health_check(&self, _trigger: &Trigger) -> Result<(), CoreError> {
        Ok(())
    }
}
