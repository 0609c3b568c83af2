use std::path::Path;

use axum::{
    http::{header, HeaderName, HeaderValue},
    Router,
};
use tower_http::{
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
};

pub const SERVICE_WORKER_PATH: &str = "/sw.js";

/// The worker script must never be served stale, or a new cache generation
/// would not be picked up until the HTTP cache expires.
pub fn service_worker_routes(static_dir: &Path) -> Router {
    Router::new()
        .route_service(SERVICE_WORKER_PATH, ServeFile::new(static_dir.join("sw.js")))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("service-worker-allowed"),
            HeaderValue::from_static("/"),
        ))
}

/// Built frontend assets. Unknown paths get `index.html` so client-side
/// routes survive a reload.
pub fn spa(static_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")))
}
