use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::proxy::handler;
use crate::proxy::middleware::{cors_layer, log_requests};
use crate::proxy::rules::RuleSet;
use crate::proxy::upstream::UpstreamClient;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleSet>,
    pub upstream: Arc<UpstreamClient>,
}

/// Running dev server instance
pub struct DevServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

impl DevServer {
    /// Bind and start serving.
    ///
    /// The rule table is compiled from the configuration before anything is
    /// bound; a bad rule means no listener. Returns the instance and the
    /// accept-loop task handle.
    pub async fn start(config: &AppConfig) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let rules = config.server.compile_rules()?;
        if rules.is_empty() {
            tracing::warn!("no proxy rules configured; serving fallback only");
        }

        let state = AppState {
            rules: Arc::new(rules),
            upstream: Arc::new(UpstreamClient::new(config.server.request_timeout)?),
        };

        // Build routes: health endpoint plus the dev-server fallback, with
        // the proxy interceptor layered over everything
        let app = Router::new().route("/healthz", get(health_check_handler));
        let app = match &config.static_root {
            Some(root) => app.fallback_service(
                ServeDir::new(root).append_index_html_on_directories(true),
            ),
            None => app.fallback(handler::not_found_handler),
        };
        let app = app
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                handler::proxy_middleware,
            ))
            .layer(axum::middleware::from_fn(log_requests))
            .layer(cors_layer())
            .with_state(state);

        // Bind address
        let addr = config.server.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!("dev server started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .with_upgrades()
                                        .await
                                    {
                                        debug!("connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("dev server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Address the listener actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
