//! Response Buffer (C2): an append-only ordered list per run plus two
//! pub/sub topics, `new_response` and `control`.
//!
//! This is an in-memory reference implementation. Any store offering
//! ordered append, range scan, TTL, and publish/subscribe satisfies the
//! contract (Design Notes, "Buffer + pub/sub"); a Redis- or Postgres-backed
//! implementation would sit behind the same shape.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use runloom_wire::ResponseItem;

/// A message on the `control` topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Stop,
    EndStream,
    Error,
}

impl ControlSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlSignal::Stop => "STOP",
            ControlSignal::EndStream => "END_STREAM",
            ControlSignal::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "STOP" => Some(Self::Stop),
            "END_STREAM" => Some(Self::EndStream),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

struct RunBuffer {
    items: Vec<ResponseItem>,
    new_response_tx: broadcast::Sender<()>,
    control_tx: broadcast::Sender<ControlSignal>,
}

impl RunBuffer {
    fn new() -> Self {
        Self { items: Vec::new(), new_response_tx: broadcast::channel(256).0, control_tx: broadcast::channel(16).0 }
    }
}

/// Per-run append-only log with its two topics. Cheap to clone: the backing
/// map is `Arc`-shared between the owning worker and any fan-out consumers.
#[derive(Clone, Default)]
pub struct ResponseBuffer {
    runs: Arc<DashMap<String, RunBuffer>>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item and publishes a `new_response` notification. The
    /// owning worker is the only writer for a given `run_id`.
    pub fn append(&self, run_id: &str, item: ResponseItem) {
        let mut entry = self.runs.entry(run_id.to_string()).or_insert_with(RunBuffer::new);
        entry.items.push(item);
        let _ = entry.new_response_tx.send(());
    }

    /// Range scan `[from, to)`; `to = None` means "to the current end".
    pub fn range(&self, run_id: &str, from: usize, to: Option<usize>) -> Vec<ResponseItem> {
        match self.runs.get(run_id) {
            Some(entry) => {
                let to = to.unwrap_or(entry.items.len()).min(entry.items.len());
                if from >= to {
                    Vec::new()
                } else {
                    entry.items[from..to].to_vec()
                }
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self, run_id: &str) -> usize {
        self.runs.get(run_id).map(|e| e.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, run_id: &str) -> bool {
        self.len(run_id) == 0
    }

    /// Subscribes to `new_response`; the receiver only carries a wake-up
    /// trigger, never the item itself — truth is always the buffer.
    pub fn subscribe_new_response(&self, run_id: &str) -> broadcast::Receiver<()> {
        self.runs.entry(run_id.to_string()).or_insert_with(RunBuffer::new).new_response_tx.subscribe()
    }

    pub fn subscribe_control(&self, run_id: &str) -> broadcast::Receiver<ControlSignal> {
        self.runs.entry(run_id.to_string()).or_insert_with(RunBuffer::new).control_tx.subscribe()
    }

    pub fn publish_control(&self, run_id: &str, signal: ControlSignal) {
        if let Some(entry) = self.runs.get(run_id) {
            let _ = entry.control_tx.send(signal);
        }
    }

    /// Deletes the run's buffer keys (Run Worker finalise step).
    pub fn delete(&self, run_id: &str) {
        self.runs.remove(run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runloom_wire::ItemType;
    use serde_json::json;

    fn item(n: u32) -> ResponseItem {
        ResponseItem::new("thread-1", ItemType::Status, json!({"status_type": "finish", "n": n}), json!({}), false, "now")
    }

    #[test]
    fn append_then_range_replays_in_order() {
        let buffer = ResponseBuffer::new();
        buffer.append("run-1", item(0));
        buffer.append("run-1", item(1));
        buffer.append("run-1", item(2));
        let replayed = buffer.range("run-1", 0, None);
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].content["n"], 0);
        assert_eq!(replayed[2].content["n"], 2);
    }

    #[test]
    fn range_from_midpoint_returns_suffix() {
        let buffer = ResponseBuffer::new();
        for n in 0..5 {
            buffer.append("run-1", item(n));
        }
        let suffix = buffer.range("run-1", 3, None);
        assert_eq!(suffix.len(), 2);
        assert_eq!(suffix[0].content["n"], 3);
    }

    #[test]
    fn control_signal_round_trips_through_strings() {
        for signal in [ControlSignal::Stop, ControlSignal::EndStream, ControlSignal::Error] {
            assert_eq!(ControlSignal::parse(signal.as_str()), Some(signal));
        }
        assert_eq!(ControlSignal::parse("garbage"), None);
    }

    #[tokio::test]
    async fn subscriber_is_notified_on_append() {
        let buffer = ResponseBuffer::new();
        let mut rx = buffer.subscribe_new_response("run-1");
        buffer.append("run-1", item(0));
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn delete_clears_the_run() {
        let buffer = ResponseBuffer::new();
        buffer.append("run-1", item(0));
        buffer.delete("run-1");
        assert!(buffer.is_empty("run-1"));
    }
}
