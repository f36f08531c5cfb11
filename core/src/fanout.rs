//! Stream Fan-out (C7): replays a run's buffer to a newly-connecting viewer,
//! then follows `new_response`/`control` until the run ends or the viewer
//! disconnects.

use async_trait::async_trait;
use tokio::sync::mpsc;

use runloom_wire::ResponseItem;

use crate::buffer::{ControlSignal, ResponseBuffer};
use crate::error::CoreError;
use crate::items;

/// External authorization check: may this caller view this run's stream?
/// Left abstract because the identity model lives outside this crate.
#[async_trait]
pub trait ViewAuthorization: Send + Sync {
    async fn can_view(&self, run_id: &str) -> Result<bool, CoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunLifecycleStatus {
    Running,
    Terminal,
}

/// Reads the run-status record's coarse running/terminal state; the fine
/// status value itself belongs to `worker::RunStatus`.
#[async_trait]
pub trait RunLifecycleReader: Send + Sync {
    async fn status(&self, run_id: &str) -> Result<RunLifecycleStatus, CoreError>;
}

pub enum FanoutError {
    Unauthorized,
    Internal(CoreError),
}

pub struct StreamFanout {
    buffer: ResponseBuffer,
    auth: std::sync::Arc<dyn ViewAuthorization>,
    lifecycle: std::sync::Arc<dyn RunLifecycleReader>,
}

impl StreamFanout {
    pub fn new(
        buffer: ResponseBuffer,
        auth: std::sync::Arc<dyn ViewAuthorization>,
        lifecycle: std::sync::Arc<dyn RunLifecycleReader>,
    ) -> Self {
        Self { buffer, auth, lifecycle }
    }

    /// The connect-time authorization check, callable up front so an HTTP
    /// handler can reject before committing to a streaming response.
    pub async fn authorize(&self, run_id: &str) -> Result<bool, CoreError> {
        self.auth.can_view(run_id).await
    }

    /// Drives the full viewer protocol, pushing items into `sink` until the
    /// run reaches a terminal item, the control channel ends the stream, or
    /// `sink` is dropped (the viewer disconnected).
    pub async fn run(&self, run_id: &str, sink: mpsc::Sender<ResponseItem>) -> Result<(), FanoutError> {
        if !self.authorize(run_id).await.map_err(FanoutError::Internal)? {
            return Err(FanoutError::Unauthorized);
        }

        let mut last_index = 0usize;
        for item in self.buffer.range(run_id, 0, None) {
            let is_terminal = item.is_thread_run_end();
            last_index += 1;
            if sink.send(item).await.is_err() {
                return Ok(());
            }
            if is_terminal {
                return Ok(());
            }
        }

        if self.lifecycle.status(run_id).await.map_err(FanoutError::Internal)? == RunLifecycleStatus::Terminal {
            let _ = sink.send(items::fanout_status(run_id, "completed")).await;
            return Ok(());
        }

        let mut new_response_rx = self.buffer.subscribe_new_response(run_id);
        let mut control_rx = self.buffer.subscribe_control(run_id);

        loop {
            tokio::select! {
                received = new_response_rx.recv() => {
                    if received.is_err() {
                        let _ = sink.send(items::fanout_status(run_id, "error")).await;
                        return Ok(());
                    }
                    let batch = self.buffer.range(run_id, last_index, None);
                    for item in batch {
                        let is_terminal = item.is_thread_run_end() || item.is_finish();
                        last_index += 1;
                        if sink.send(item).await.is_err() {
                            return Ok(());
                        }
                        if is_terminal {
                            return Ok(());
                        }
                    }
                }
                signal = control_rx.recv() => {
                    match signal {
                        Ok(ControlSignal::Stop) => {
                            let _ = sink.send(items::fanout_status(run_id, "stopped")).await;
                            return Ok(());
                        }
                        Ok(ControlSignal::EndStream) => {
                            let _ = sink.send(items::fanout_status(run_id, "completed")).await;
                            return Ok(());
                        }
                        Ok(ControlSignal::Error) => {
                            let _ = sink.send(items::fanout_status(run_id, "error")).await;
                            return Ok(());
                        }
                        Err(_) => {
                            let _ = sink.send(items::fanout_status(run_id, "error")).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
