// Request interception - rule resolution and forwarding

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use tracing::{error, info};

use crate::proxy::server::AppState;

/// Proxy interceptor, layered over the whole router.
///
/// A request whose path matches a configured prefix is forwarded upstream;
/// everything else stays with the regular dev-server handling.
pub async fn proxy_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let spec = state.rules.resolve(request.uri().path());
    match spec {
        Some(spec) => {
            info!("{} {} -> {}", request.method(), request.uri().path(), spec.url);
            match state.upstream.forward(&spec, request).await {
                Ok(response) => response,
                Err(e) => {
                    error!("proxy error: {}", e);
                    (StatusCode::BAD_GATEWAY, format!("proxy error: {}", e)).into_response()
                }
            }
        }
        None => next.run(request).await,
    }
}

/// Fallback when no static root is configured
pub async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"msg": "not found"})),
    )
        .into_response()
}
