//! Accumulates native (provider-form) tool call deltas, keyed by index, into
//! complete calls once their argument JSON has fully arrived.

use std::collections::BTreeMap;

use serde_json::Map;

use crate::llm::NativeToolCallDelta;
use crate::message::ToolCall;

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    function_name: Option<String>,
    arguments_buf: String,
}

fn is_ready(partial: &PartialCall) -> bool {
    partial.function_name.is_some()
        && serde_json::from_str::<Map<String, serde_json::Value>>(if partial.arguments_buf.is_empty() {
            "{}"
        } else {
            &partial.arguments_buf
        })
        .is_ok()
}

fn build(partial: PartialCall) -> ToolCall {
    let arguments = serde_json::from_str(&partial.arguments_buf).unwrap_or_default();
    ToolCall::new_native(partial.id.unwrap_or_default(), partial.function_name.unwrap_or_default(), arguments)
}

/// Merges deltas across a whole cycle, keyed by provider index.
#[derive(Default)]
pub struct NativeToolCallAccumulator {
    partials: BTreeMap<usize, PartialCall>,
}

impl NativeToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, delta: &NativeToolCallDelta) {
        let partial = self.partials.entry(delta.index).or_default();
        if let Some(id) = &delta.id {
            partial.id = Some(id.clone());
        }
        if let Some(name) = &delta.function_name {
            partial.function_name = Some(name.clone());
        }
        if let Some(chunk) = &delta.arguments_delta {
            partial.arguments_buf.push_str(chunk);
        }
    }

    /// Finalises every call whose id, function name, and arguments JSON are
    /// all present, removing them from the pending set.
    pub fn drain_complete(&mut self) -> Vec<ToolCall> {
        let ready_indices: Vec<usize> =
            self.partials.iter().filter(|(_, p)| is_ready(p)).map(|(i, _)| *i).collect();
        ready_indices
            .into_iter()
            .map(|i| build(self.partials.remove(&i).unwrap()))
            .collect()
    }

    /// Flushes every remaining partial at stream end, falling back to empty
    /// arguments for any call whose JSON never validated.
    pub fn finalize_all_lenient(mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.partials)
            .into_iter()
            .filter(|(_, p)| p.function_name.is_some())
            .map(|(_, p)| build(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> NativeToolCallDelta {
        NativeToolCallDelta {
            index,
            id: id.map(String::from),
            function_name: name.map(String::from),
            arguments_delta: args.map(String::from),
        }
    }

    #[test]
    fn merges_arguments_delta_across_chunks() {
        let mut acc = NativeToolCallAccumulator::new();
        acc.ingest(&delta(0, Some("call_1"), Some("search"), Some("{\"q\":")));
        acc.ingest(&delta(0, None, None, Some("\"rust\"}")));
        let complete = acc.drain_complete();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].function_name, "search");
        assert_eq!(complete[0].arguments.get("q").unwrap(), "rust");
    }

    #[test]
    fn incomplete_json_is_not_drained_early() {
        let mut acc = NativeToolCallAccumulator::new();
        acc.ingest(&delta(0, Some("call_1"), Some("search"), Some("{\"q\":\"rus")));
        assert!(acc.drain_complete().is_empty());
    }

    #[test]
    fn distinct_indices_tracked_independently() {
        let mut acc = NativeToolCallAccumulator::new();
        acc.ingest(&delta(0, Some("a"), Some("f1"), Some("{}")));
        acc.ingest(&delta(1, Some("b"), Some("f2"), Some("{}")));
        assert_eq!(acc.drain_complete().len(), 2);
    }

    #[test]
    fn lenient_finalize_falls_back_to_empty_arguments() {
        let mut acc = NativeToolCallAccumulator::new();
        acc.ingest(&delta(0, Some("a"), Some("f1"), Some("{\"q\":\"trunc")));
        let flushed = acc.finalize_all_lenient();
        assert_eq!(flushed.len(), 1);
        assert!(flushed[0].arguments.is_empty());
    }
}
