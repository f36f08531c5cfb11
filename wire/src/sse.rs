//! Server-Sent-Events framing for `ResponseItem`s delivered to viewers.

use crate::item::ResponseItem;

/// Frames one `ResponseItem` as an SSE `data:` line.
///
/// Per the streaming contract: each event is `data: <json>\n\n`, where the
/// JSON is the `ResponseItem` with `content`/`metadata` string-encoded
/// rather than inlined (see [`ResponseItem::to_wire_value`]).
pub fn to_sse_line(item: &ResponseItem) -> serde_json::Result<String> {
    let payload = serde_json::to_string(&item.to_wire_value())?;
    Ok(format!("data: {payload}\n\n"))
}

/// Headers a streaming endpoint must set for `ResponseItem` SSE delivery.
pub const SSE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-transform"),
    ("Connection", "keep-alive"),
    ("X-Accel-Buffering", "no"),
];
