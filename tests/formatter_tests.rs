use brrtdispatch::error::FormatError;
use brrtdispatch::formatter::{format_output, HandlerOutput};
use brrtdispatch::server::{Headers, Response};
use futures::StreamExt;
use serde_json::{json, Value};

fn text(resp: &Response) -> String {
    String::from_utf8(resp.body_bytes().unwrap().to_vec()).unwrap()
}

#[test]
fn test_json_map_is_200_json() {
    let resp = format_output(json!({"a": 1}).into()).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_slice(resp.body_bytes().unwrap()).unwrap();
    assert_eq!(body, json!({"a": 1}));
}

#[test]
fn test_tuple_with_bytes_headers_and_status() {
    let headers = Headers::from_pairs([("Content-Type", "text/csv")]);
    let resp = format_output((b"x".to_vec(), headers, 201_u16).into()).unwrap();
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("Content-Type"), Some("text/csv"));
    assert_eq!(resp.body_bytes(), Some(&b"x"[..]));
}

#[test]
fn test_string_is_text_plain() {
    let resp = format_output("ok".into()).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("text/plain"));
    assert_eq!(text(&resp), "ok");
}

#[test]
fn test_bytes_are_octet_stream() {
    let resp = format_output(HandlerOutput::from(&[0_u8, 1, 2][..])).unwrap();
    assert_eq!(
        resp.get_header("content-type"),
        Some("application/octet-stream")
    );
    assert_eq!(resp.body_bytes(), Some(&[0_u8, 1, 2][..]));
}

#[test]
fn test_scalars_are_stringified() {
    assert_eq!(text(&format_output(42_i64.into()).unwrap()), "42");
    assert_eq!(text(&format_output(true.into()).unwrap()), "true");
    assert_eq!(text(&format_output(json!([1, 2]).into()).unwrap()), "[1,2]");
}

#[test]
fn test_tuple_headers_override_body_defaults() {
    let headers = Headers::from_pairs([("content-type", "application/problem+json"), ("X-A", "1")]);
    let resp = format_output(HandlerOutput::with_parts(
        json!({"title": "conflict"}),
        headers,
        409,
    ))
    .unwrap();
    assert_eq!(resp.status, 409);
    assert_eq!(
        resp.get_header("Content-Type"),
        Some("application/problem+json")
    );
    assert_eq!(resp.get_header("x-a"), Some("1"));
}

#[test]
fn test_response_passes_through_unchanged() {
    let original = Response::html("<h1>hi</h1>");
    let resp = format_output(original.into()).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("text/html"));
    assert_eq!(text(&resp), "<h1>hi</h1>");
}

#[test]
fn test_streaming_body_inside_tuple_is_rejected() {
    let stream = futures::stream::iter(vec![Ok::<_, anyhow::Error>(b"data: 1\n\n".to_vec())]);
    let streaming = Response::streaming(stream, None);
    let err = format_output(HandlerOutput::with_parts(streaming, Headers::new(), 200)).unwrap_err();
    assert!(matches!(err, FormatError::StreamingInTuple));
}

#[tokio::test]
async fn test_streaming_response_passes_through() {
    let stream = futures::stream::iter(vec![Ok::<_, anyhow::Error>(b"a".to_vec()), Ok(b"b".to_vec())]);
    let resp = format_output(Response::streaming(stream, None).into()).unwrap();
    assert!(resp.is_streaming());
    assert_eq!(resp.get_header("content-type"), Some("text/event-stream"));

    let chunks: Vec<Vec<u8>> = match resp.body {
        brrtdispatch::server::ResponseBody::Stream(s) => {
            s.map(|chunk| chunk.unwrap()).collect().await
        }
        brrtdispatch::server::ResponseBody::Bytes(_) => panic!("expected a stream"),
    };
    assert_eq!(chunks, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[tokio::test]
async fn test_sse_response_streams_framed_events() {
    let events = futures::stream::iter(vec![
        Ok::<_, anyhow::Error>(brrtdispatch::sse_message("first", Some("tick"), Some("1"), None)),
        Ok(brrtdispatch::sse_message("a\nb", None, None, Some(500))),
    ]);
    let resp = format_output(Response::sse(events).into()).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("text/event-stream"));
    assert_eq!(resp.get_header("cache-control"), Some("no-cache"));

    let body = match resp.body {
        brrtdispatch::server::ResponseBody::Stream(s) => {
            s.map(|chunk| chunk.unwrap()).collect::<Vec<_>>().await.concat()
        }
        brrtdispatch::server::ResponseBody::Bytes(_) => panic!("expected a stream"),
    };
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "event: tick\nid: 1\ndata: first\n\nretry: 500\ndata: a\ndata: b\n\n"
    );
}
