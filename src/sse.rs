//! Server-Sent Events framing.
//!
//! [`sse_message`] encodes one event in `text/event-stream` format and
//! [`Response::sse`](crate::server::Response::sse) streams a sequence of them:
//!
//! ```text
//! event: tick
//! id: 7
//! data: line one
//! data: line two
//!
//! ```

/// Encode one event.
///
/// Optional fields come first in `event`, `id`, `retry` order. CRLF and CR in
/// `data` are normalized to LF and every line becomes its own `data:` field; empty
/// data still emits a single `data: ` line. The frame ends with a blank line.
#[must_use]
pub fn sse_message(data: &str, event: Option<&str>, id: Option<&str>, retry: Option<u64>) -> String {
    let mut out = String::with_capacity(data.len() + 16);
    if let Some(event) = event.filter(|e| !e.is_empty()) {
        out.push_str("event: ");
        out.push_str(event);
        out.push('\n');
    }
    if let Some(id) = id.filter(|i| !i.is_empty()) {
        out.push_str("id: ");
        out.push_str(id);
        out.push('\n');
    }
    if let Some(retry) = retry.filter(|r| *r > 0) {
        out.push_str(&format!("retry: {retry}\n"));
    }

    if data.contains(['\n', '\r']) {
        let normalized = data.replace("\r\n", "\n").replace('\r', "\n");
        for line in normalized.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
    } else {
        out.push_str("data: ");
        out.push_str(data);
        out.push('\n');
    }

    out.push('\n');
    out
}
