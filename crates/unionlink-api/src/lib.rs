//! unionlink-api — read-only HTTP view of the mirrored link table.
//!
//! Routes:
//! - `GET /allLinks` — every persisted `(user, identity)` pair as `{"data": [...]}`
//! - `GET /health`   — liveness
//! - `GET /status`   — scanner counters
//!
//! Every response carries `Access-Control-Allow-Origin: *` and
//! `Access-Control-Allow-Headers: Content-Type`.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::shutdown::Shutdown;
use unionlink_core::store::LinkStore;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn LinkStore>,
    pub metrics: Arc<ScannerMetrics>,
}

impl ApiState {
    pub fn new(store: Arc<dyn LinkStore>, metrics: Arc<ScannerMetrics>) -> Self {
        Self { store, metrics }
    }
}

/// Build the API router. Unknown paths fall through to axum's 404.
pub fn create_api_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/allLinks", get(handlers::all_links))
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` fires, then drain open
/// connections.
pub async fn serve(listener: TcpListener, router: Router, shutdown: Shutdown) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "API server listening");
    }
    let mut shutdown = shutdown;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
}
