//! `GET /runs/:run_id/stream` — Stream Fan-out's HTTP surface.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use runloom_wire::sse::{to_sse_line, SSE_HEADERS};

use crate::state::AppState;

pub async fn stream_run(Path(run_id): Path<String>, State(state): State<AppState>) -> Response {
    match state.fanout.authorize(&run_id).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            tracing::warn!(run_id = %run_id, error = %err, "stream authorization check failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let (tx, rx) = mpsc::channel(64);
    let fanout = state.fanout.clone();
    let run_id_for_task = run_id.clone();
    tokio::spawn(async move {
        if let Err(runloom_core::fanout::FanoutError::Internal(err)) = fanout.run(&run_id_for_task, tx).await {
            tracing::warn!(run_id = %run_id_for_task, error = %err, "stream fan-out ended with an error");
        }
    });

    let body_stream =
        ReceiverStream::new(rx).map(|item| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(to_sse_line(&item).unwrap_or_default())));

    let mut response = Response::new(Body::from_stream(body_stream));
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("content-type"), HeaderValue::from_static("text/event-stream"));
    for (name, value) in SSE_HEADERS {
        if let Some(lower) = lowercase_header_name(name) {
            headers.insert(lower, HeaderValue::from_static(value));
        }
    }
    response
}

fn lowercase_header_name(name: &'static str) -> Option<HeaderName> {
    match name {
        "Cache-Control" => Some(HeaderName::from_static("cache-control")),
        "Connection" => Some(HeaderName::from_static("connection")),
        "X-Accel-Buffering" => Some(HeaderName::from_static("x-accel-buffering")),
        _ => None,
    }
}
