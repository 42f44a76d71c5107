// CORS for the local dev listener

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS, as a local development listener wants
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
