//! Route definitions for the device control plane.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::bridge::Registry;

/// Build the control-plane router.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/devices", get(handlers::list_devices))
        .route("/add-device", post(handlers::add_device))
        .route("/delete-device", delete(handlers::delete_device))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}
