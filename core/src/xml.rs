//! XML Tool Parser (C4): extracts `<function_calls>` blocks from a text
//! stream and produces canonical tool calls.
//!
//! Recognised form (single, authoritative):
//!
//! ```xml
//! <function_calls>
//!   <invoke name="list_files">
//!     <parameter name="path">/tmp</parameter>
//!   </invoke>
//! </function_calls>
//! ```
//!
//! Extraction of the outer tag is hand-rolled (not regex) because it must
//! tolerate nested same-name tags via a depth counter; `<invoke>`/`<parameter>`
//! don't nest, so those are pulled out with a pair of non-greedy regexes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::message::ToolCall;

const OPEN_TAG: &str = "<function_calls>";
const CLOSE_TAG: &str = "</function_calls>";

static INVOKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<invoke\s+name="([^"]+)"\s*>(.*?)</invoke>"#).unwrap());
static PARAMETER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<parameter\s+name="([^"]+)"\s*>(.*?)</parameter>"#).unwrap());

/// One `<function_calls>…</function_calls>` block found in a text window.
pub struct FunctionCallsBlock<'a> {
    /// Byte offset of `<function_calls>` in the source text.
    pub start: usize,
    /// Byte offset just past `</function_calls>`.
    pub end: usize,
    pub raw_xml: &'a str,
}

/// Finds every *complete* `<function_calls>…</function_calls>` block in
/// `text`, tolerating nested same-name tags via a depth counter. A trailing
/// unterminated block (the model is still streaming it) is not returned.
pub fn find_complete_blocks(text: &str) -> Vec<FunctionCallsBlock<'_>> {
    let mut blocks = Vec::new();
    let mut search_from = 0usize;

    while let Some(rel_start) = text[search_from..].find(OPEN_TAG) {
        let start = search_from + rel_start;
        let mut depth = 1usize;
        let mut cursor = start + OPEN_TAG.len();
        let mut end = None;

        loop {
            let next_open = text[cursor..].find(OPEN_TAG).map(|p| cursor + p);
            let next_close = text[cursor..].find(CLOSE_TAG).map(|p| cursor + p);
            match (next_open, next_close) {
                (Some(o), Some(c)) if o < c => {
                    depth += 1;
                    cursor = o + OPEN_TAG.len();
                }
                (_, Some(c)) => {
                    depth -= 1;
                    cursor = c + CLOSE_TAG.len();
                    if depth == 0 {
                        end = Some(cursor);
                        break;
                    }
                }
                _ => break,
            }
        }

        match end {
            Some(e) => {
                blocks.push(FunctionCallsBlock {
                    start,
                    end: e,
                    raw_xml: &text[start..e],
                });
                search_from = e;
            }
            None => break,
        }
    }

    blocks
}

/// Parses every `<invoke>` inside one complete block into canonical tool calls.
pub fn parse_block(raw_xml: &str) -> Vec<ToolCall> {
    parse_block_with_details(raw_xml)
        .into_iter()
        .map(|(call, _details)| call)
        .collect()
}

/// Like [`parse_block`] but also returns each call's `parsing_details` JSON.
pub fn parse_block_with_details(raw_xml: &str) -> Vec<(ToolCall, Value)> {
    INVOKE_RE
        .captures_iter(raw_xml)
        .map(|invoke_caps| {
            let function_name = invoke_caps[1].to_string();
            let body = &invoke_caps[2];

            let mut arguments = Map::new();
            let mut elements = Map::new();
            let mut text_content = String::new();
            for param_caps in PARAMETER_RE.captures_iter(body) {
                let key = param_caps[1].to_string();
                let value = param_caps[2].trim().to_string();
                text_content.push_str(&value);
                elements.insert(key.clone(), Value::String(value.clone()));
                arguments.insert(key, Value::String(value));
            }

            let parsing_details = serde_json::json!({
                "raw_xml": invoke_caps[0].to_string(),
                "attributes": {"name": function_name.clone()},
                "elements": Value::Object(elements),
                "text_content": text_content,
                "root_content": raw_xml,
            });

            (ToolCall::new_xml(function_name, arguments), parsing_details)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_single_complete_block() {
        let text = r#"Sure.<function_calls><invoke name="list_files"><parameter name="path">/tmp</parameter></invoke></function_calls>"#;
        let blocks = find_complete_blocks(text);
        assert_eq!(blocks.len(), 1);
        let calls = parse_block(blocks[0].raw_xml);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function_name, "list_files");
        assert_eq!(
            calls[0].arguments.get("path").and_then(Value::as_str),
            Some("/tmp")
        );
    }

    #[test]
    fn ignores_trailing_incomplete_block() {
        let text = r#"<function_calls><invoke name="ask"><parameter name="q">hi</parameter></invoke></function_calls><function_calls><invoke name="partial">"#;
        let blocks = find_complete_blocks(text);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn passes_through_non_xml_content_unchanged() {
        let text = "no tool calls here";
        assert!(find_complete_blocks(text).is_empty());
    }

    #[test]
    fn multiple_invokes_in_one_block() {
        let text = r#"<function_calls><invoke name="a"><parameter name="x">1</parameter></invoke><invoke name="b"><parameter name="y">2</parameter></invoke></function_calls>"#;
        let blocks = find_complete_blocks(text);
        let calls = parse_block(blocks[0].raw_xml);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function_name, "a");
        assert_eq!(calls[1].function_name, "b");
    }

    #[test]
    fn round_trips_function_name_and_argument_keys() {
        // Invariant 7: parse then "re-render" preserves function_name and the
        // argument key-set.
        let text = r#"<function_calls><invoke name="search"><parameter name="query">rust</parameter><parameter name="limit">5</parameter></invoke></function_calls>"#;
        let blocks = find_complete_blocks(text);
        let calls = parse_block(blocks[0].raw_xml);
        let call = &calls[0];
        assert_eq!(call.function_name, "search");
        let mut keys: Vec<&str> = call.arguments.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["limit", "query"]);

        // Re-render using the canonical form and re-parse.
        let rendered = format!(
            "<function_calls><invoke name=\"{}\">{}</invoke></function_calls>",
            call.function_name,
            call.arguments
                .iter()
                .map(|(k, v)| format!(
                    "<parameter name=\"{}\">{}</parameter>",
                    k,
                    v.as_str().unwrap()
                ))
                .collect::<String>()
        );
        let reparsed = parse_block(find_complete_blocks(&rendered)[0].raw_xml);
        assert_eq!(reparsed[0].function_name, call.function_name);
        let mut reparsed_keys: Vec<&str> =
            reparsed[0].arguments.keys().map(String::as_str).collect();
        reparsed_keys.sort();
        assert_eq!(reparsed_keys, keys);
    }

    #[test]
    fn hyphenated_xml_tag_name_for_display() {
        let text = r#"<function_calls><invoke name="list_files"><parameter name="path">/tmp</parameter></invoke></function_calls>"#;
        let calls = parse_block(find_complete_blocks(text)[0].raw_xml);
        assert_eq!(calls[0].xml_tag_name.as_deref(), Some("list-files"));
    }

    #[test]
    fn parsing_details_carries_raw_xml_and_root_content() {
        let text = r#"<function_calls><invoke name="ask"><parameter name="q">hi</parameter></invoke></function_calls>"#;
        let (_, details) = &parse_block_with_details(text)[0];
        assert!(details["raw_xml"].as_str().unwrap().contains("<invoke"));
        assert_eq!(details["root_content"].as_str().unwrap(), text);
        assert_eq!(details["text_content"].as_str().unwrap(), "hi");
    }
}
