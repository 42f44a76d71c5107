// Middleware module - axum layers shared by the dev server

pub mod cors;
pub mod logging;

pub use cors::cors_layer;
pub use logging::log_requests;
