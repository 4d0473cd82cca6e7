//! Stub inference server satisfying the hosting platform's container
//! contract: `GET /ping` for health, `POST /invocations` for predictions.
//!
//! Holds no state and loads no model.

use crate::error::Result;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// Address the platform sends traffic to.
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Body of every prediction.
pub const DUMMY_PREDICTION: &str = "dummy prediction";

pub fn router() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .layer(middleware::from_fn(trace_request))
}

async fn ping() -> &'static str {
    "pong"
}

// Request body is never read
async fn invocations() -> Json<Value> {
    Json(json!({ "result": DUMMY_PREDICTION }))
}

async fn trace_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "stub server listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("stub server stopped");
    Ok(())
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn run(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(listener, ctrl_c()).await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
