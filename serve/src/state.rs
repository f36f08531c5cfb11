//! Shared state handed to every route: the collaborators a request needs,
//! all already constructed by the caller that builds the `Router`.

use std::sync::Arc;

use runloom_core::bridge::ExecutionBridge;
use runloom_core::buffer::ResponseBuffer;
use runloom_core::fanout::StreamFanout;
use runloom_core::trigger::{TriggerLookup, TriggerService};
use runloom_core::workflow::WorkflowStore;

#[derive(Clone)]
pub struct AppState {
    pub buffer: ResponseBuffer,
    pub fanout: Arc<StreamFanout>,
    pub triggers: Arc<dyn TriggerLookup>,
    pub trigger_service: Arc<TriggerService>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub bridge: Arc<ExecutionBridge>,
}
