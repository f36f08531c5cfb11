//! `POST /triggers/:trigger_id/events` — webhook ingress for every provider.
//! The path is opaque per trigger; the provider-specific decision lives in
//! the registered `TriggerProvider`, not here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::Value;

use runloom_core::bridge::ExecutionTarget;
use runloom_core::trigger::TriggerEvent;

use crate::state::AppState;

pub async fn ingest_event(Path(trigger_id): Path<String>, State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let trigger = match state.triggers.get(&trigger_id).await {
        Ok(trigger) => trigger,
        Err(err) => {
            tracing::warn!(trigger_id = %trigger_id, error = %err, "unknown trigger on webhook ingress");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let event = TriggerEvent {
        trigger_id: trigger.trigger_id.clone(),
        agent_id: trigger.agent_id.clone(),
        event_type: "webhook".to_string(),
        raw_data: payload,
        timestamp: Utc::now(),
    };

    let result = match state.trigger_service.process_event(&trigger, event).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(trigger_id = %trigger_id, error = %err, "trigger event processing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !result.success {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"status": "rejected", "error": result.error_message}))).into_response();
    }

    let target = if result.should_execute_workflow {
        let workflow_id = result.workflow_id.clone().unwrap_or_default();
        let steps = match state.workflows.load(&workflow_id).await {
            Ok(steps) => steps,
            Err(err) => {
                tracing::error!(workflow_id = %workflow_id, error = %err, "failed to load workflow steps");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        ExecutionTarget::Workflow { steps, input: result.workflow_input.clone() }
    } else {
        ExecutionTarget::Agent { prompt: result.agent_prompt.clone().unwrap_or_default() }
    };

    match state.bridge.execute(&trigger.agent_id, target).await {
        Ok(outcome) => {
            let body = if result.should_execute_workflow {
                serde_json::json!({"status": "accepted", "execution_id": outcome.run_id, "workflow_id": result.workflow_id})
            } else {
                serde_json::json!({"status": "accepted", "execution_id": outcome.run_id, "agent_id": trigger.agent_id})
            };
            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
        Err(err) => {
            tracing::error!(trigger_id = %trigger_id, error = %err, "execution bridge failed to enqueue the run");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
