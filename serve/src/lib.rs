//! HTTP surface for the orchestration substrate: the Stream Fan-out
//! endpoint and the trigger webhook ingress. Both are thin axum handlers
//! over `runloom-core`'s collaborator traits — every decision of substance
//! lives in the core crate.

pub mod app;
pub mod state;
pub mod stream;
pub mod webhook;

pub use app::router;
pub use state::AppState;

/// Runs the HTTP surface on an existing listener. Used directly by tests
/// that bind to `127.0.0.1:0` first to get an ephemeral port.
pub async fn run_serve_on_listener(listener: tokio::net::TcpListener, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "runloom-serve listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the HTTP surface, binding `addr` itself.
pub async fn run_serve(addr: &str, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state).await
}
