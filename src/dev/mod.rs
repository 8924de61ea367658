//! In-memory licensing backend for local development and tests.
//!
//! Speaks the same wire contract as the production backend: activation
//! binds a key to one device fingerprint, info returns the current shop
//! record. Extra `/api/dev` routes seed shops and simulate paid operations.

mod error;
mod handlers;
mod registry;

pub use error::*;
pub use handlers::*;
pub use registry::*;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{ACTIVATE_PATH, INFO_PATH};

pub fn api_router() -> Router<DevRegistry> {
    Router::new()
        .route(ACTIVATE_PATH, post(activate_license))
        .route(INFO_PATH, get(license_info))
        .route("/dev/shops", post(create_dev_shop))
        .route("/dev/shops/{key}/consume", post(consume_credit))
}

pub fn router(registry: DevRegistry) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

/// Serves the dev backend on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, registry: DevRegistry) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("DEV: licensing backend listening on http://{}/api", addr);
    }
    axum::serve(listener, router(registry)).await
}
