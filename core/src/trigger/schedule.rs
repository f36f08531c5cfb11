//! Schedule provider: cron-driven triggers backed by an external scheduler
//! (the QStash-shaped collaborator of the Scheduler trait).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

use super::{Trigger, TriggerEvent, TriggerProvider, TriggerResult};

/// The external scheduling collaborator: registers a cron job that
/// calls back to a destination URL, and enumerates/cancels jobs by id.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, dest_url: &str, cron_expression: &str, body: Value, headers: Value) -> Result<String, CoreError>;
    async fn delete(&self, schedule_id: &str) -> Result<(), CoreError>;
    /// Returns `(schedule_id, dest_url)` pairs, for the teardown fallback
    /// when a trigger's stored `schedule_id` has been lost.
    async fn list(&self) -> Result<Vec<(String, String)>, CoreError>;
}

#[derive(Debug, Deserialize, Serialize)]
struct ScheduleConfig {
    cron_expression: String,
    execution_type: String,
    #[serde(default)]
    agent_prompt: Option<String>,
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Rewrites a concrete `M H` minute/hour pair from the trigger's declared
/// timezone into UTC; wildcard or range fields pass through unchanged since
/// there is no single wall-clock instant to convert.
pub fn convert_wall_clock_to_utc(cron_expression: &str, timezone: &str) -> Result<String, CoreError> {
    shift_cron(cron_expression, timezone, Direction::ToUtc)
}

/// The inverse of [`convert_wall_clock_to_utc`], used to display a stored
/// UTC cron expression back in the trigger's declared timezone.
pub fn convert_utc_to_wall_clock(cron_expression: &str, timezone: &str) -> Result<String, CoreError> {
    shift_cron(cron_expression, timezone, Direction::FromUtc)
}

#[derive(Clone, Copy)]
enum Direction {
    ToUtc,
    FromUtc,
}

fn shift_cron(cron_expression: &str, timezone: &str, direction: Direction) -> Result<String, CoreError> {
    if timezone.eq_ignore_ascii_case("UTC") {
        return Ok(cron_expression.to_string());
    }
    let tz: Tz = timezone.parse().map_err(|_| CoreError::Configuration(format!("unknown timezone: {timezone}")))?;
    let fields: Vec<&str> = cron_expression.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(CoreError::Configuration(format!("cron expression must have 5 fields: {cron_expression}")));
    }
    let (Ok(minute), Ok(hour)) = (fields[0].parse::<u32>(), fields[1].parse::<u32>()) else {
        return Ok(cron_expression.to_string());
    };
    let today = Utc::now().date_naive();
    let naive = today.and_hms_opt(hour, minute, 0).ok_or_else(|| CoreError::Configuration("invalid hour/minute".into()))?;

    let (out_minute, out_hour) = match direction {
        Direction::ToUtc => {
            let local = tz
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| CoreError::Configuration("ambiguous local time across a DST boundary".into()))?;
            let utc = local.with_timezone(&Utc);
            (utc.minute(), utc.hour())
        }
        Direction::FromUtc => {
            let utc = Utc.from_utc_datetime(&naive);
            let local = utc.with_timezone(&tz);
            (local.minute(), local.hour())
        }
    };

    let rest = fields[2..].join(" ");
    Ok(format!("{out_minute} {out_hour} {rest}"))
}

pub struct ScheduleProvider {
    scheduler: Arc<dyn Scheduler>,
    webhook_base_url: String,
}

impl ScheduleProvider {
    pub fn new(scheduler: Arc<dyn Scheduler>, webhook_base_url: impl Into<String>) -> Self {
        Self { scheduler, webhook_base_url: webhook_base_url.into() }
    }

    fn dest_url(&self, trigger_id: &str) -> String {
        format!("{}/{}", self.webhook_base_url.trim_end_matches('/'), trigger_id)
    }

    fn parse(config: &Value) -> Result<ScheduleConfig, CoreError> {
        serde_json::from_value(config.clone()).map_err(|e| CoreError::Configuration(format!("invalid schedule config: {e}")))
    }
}

#[async_trait]
impl TriggerProvider for ScheduleProvider {
    fn provider_id(&self) -> &str {
        "schedule"
    }

    fn validate_config(&self, config: &Value) -> Result<(), CoreError> {
        let parsed = Self::parse(config)?;
        cron::Schedule::from_str(&format!("0 {}", parsed.cron_expression))
            .map_err(|e| CoreError::Configuration(format!("invalid cron expression: {e}")))?;
        match parsed.execution_type.as_str() {
            "agent" if parsed.agent_prompt.is_some() => {}
            "workflow" if parsed.workflow_id.is_some() => {}
            "agent" | "workflow" => {
                return Err(CoreError::Configuration("schedule trigger missing agent_prompt or workflow_id".into()))
            }
            other => return Err(CoreError::Configuration(format!("unknown execution_type: {other}"))),
        }
        convert_wall_clock_to_utc(&parsed.cron_expression, &parsed.timezone)?;
        Ok(())
    }

    async fn setup_trigger(&self, trigger: &Trigger) -> Result<Value, CoreError> {
        let parsed = Self::parse(&trigger.config)?;
        let utc_cron = convert_wall_clock_to_utc(&parsed.cron_expression, &parsed.timezone)?;
        let body = serde_json::json!({
            "trigger_id": trigger.trigger_id,
            "execution_type": parsed.execution_type,
            "agent_prompt": parsed.agent_prompt,
            "workflow_id": parsed.workflow_id,
        });
        let schedule_id = self.scheduler.schedule(&self.dest_url(&trigger.trigger_id), &utc_cron, body, serde_json::json!({})).await?;
        Ok(serde_json::json!({"schedule_id": schedule_id}))
    }

    async fn teardown_trigger(&self, trigger: &Trigger) -> Result<(), CoreError> {
        if let Some(id) = trigger.config.get("schedule_id").and_then(Value::as_str) {
            return self.scheduler.delete(id).await;
        }
        let dest = self.dest_url(&trigger.trigger_id);
        for (id, url) in self.scheduler.list().await? {
            if url == dest {
                return self.scheduler.delete(&id).await;
            }
        }
        Ok(())
    }

    async fn process_event(&self, _trigger: &Trigger, event: &TriggerEvent) -> TriggerResult {
        let execution_type = event.raw_data.get("execution_type").and_then(Value::as_str).unwrap_or("agent");
        if execution_type == "workflow" {
            let workflow_id = event.raw_data.get("workflow_id").and_then(Value::as_str).unwrap_or_default();
            TriggerResult::workflow(workflow_id, event.raw_data.clone())
        } else {
            let prompt = event.raw_data.get("agent_prompt").and_then(Value::as_str).unwrap_or_default();
            TriggerResult::agent(prompt)
        }
    }

    async fn health_check(&self, trigger: &Trigger) -> Result<(), CoreError> {
        let Some(id) = trigger.config.get("schedule_id").and_then(Value::as_str) else { return Ok(()) };
        let registered = self.scheduler.list().await?.into_iter().any(|(sid, _)| sid == id);
        if registered {
            Ok(())
        } else {
            Err(CoreError::Provider(format!("schedule {id} no longer registered")))
        }
    }
}
