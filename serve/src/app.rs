//! Axum app: router wiring over [`AppState`].

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::stream::stream_run;
use crate::webhook::ingest_event;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/runs/:run_id/stream", get(stream_run))
        .route("/triggers/:trigger_id/events", post(ingest_event))
        .with_state(state)
}
