//! Cross-cycle state carried across an auto-continue boundary.
//!
//! Passed by value rather than kept as processor-instance mutation, so a
//! cycle is replayable and testable in isolation (Design Notes, "State
//! across auto-continue").

/// Threaded between cycles of the same run when a `length` finish reason
/// triggers an automatic continuation.
#[derive(Clone, Debug, Default)]
pub struct ContinuousState {
    pub accumulated_content: String,
    pub sequence: u64,
    pub cycles_so_far: usize,
    pub thread_run_id: String,
    pub xml_calls_accepted: usize,
    pub next_tool_index: usize,
}

impl ContinuousState {
    pub fn first_cycle(thread_run_id: impl Into<String>) -> Self {
        Self { thread_run_id: thread_run_id.into(), ..Self::default() }
    }
}
