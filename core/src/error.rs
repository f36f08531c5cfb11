//! Error taxonomy for the orchestration substrate.
//!
//! Names follow a semantic taxonomy rather than mapping 1:1 onto Rust types
//! per subsystem: `ToolExecutionError` is deliberately absent here
//! because it never escapes as an error — it is captured inside a
//! [`crate::message::ToolResult`] instead.

use thiserror::Error;

/// Errors that can end a run's processing loop outright.
///
/// Everything else (tool failures, persistence hiccups, out-of-order status
/// detection) is represented as an item in the response buffer rather than
/// propagated as a Rust error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A trigger or processor configuration was rejected before any side effects ran.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The LLM transport failed in a way that should be retried or failed over.
    #[error("transient provider error: {0}")]
    TransientProvider(String),

    /// The LLM transport failed in a way that ends the run.
    #[error("provider error: {0}")]
    Provider(String),

    /// A durable write failed; callers decide whether this is fatal to the run.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl CoreError {
    /// Whether this error should trigger provider fallback rather than failing the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientProvider(_))
    }
}
