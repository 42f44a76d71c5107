// Upstream forwarding client
// One reqwest client shared by every proxied request

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::io;
use tokio::time::Duration;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::proxy::rules::ForwardSpec;

/// Hop-by-hop headers, plus Host which is recomputed per forwarded request.
static NON_FORWARDED: Lazy<HashSet<HeaderName>> = Lazy::new(|| {
    [
        "host",
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
    ]
    .into_iter()
    .map(HeaderName::from_static)
    .collect()
});

/// End-to-end headers are forwarded in both directions; connection-level
/// ones never are.
pub fn should_forward_header(name: &HeaderName) -> bool {
    !NON_FORWARDED.contains(name)
}

/// Methods that carry a request body through the proxy
pub fn should_have_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub struct UpstreamClient {
    http_client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeout_secs: u64) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            // Redirects pass through to the client untouched
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { http_client })
    }

    /// Append the original query string to the resolved forward URL
    fn forward_url(spec_url: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}?{}", spec_url, q),
            None => spec_url.to_string(),
        }
    }

    /// Forward a matched request and relay the upstream response.
    ///
    /// Bodies stream in both directions; nothing is buffered or retried.
    pub async fn forward(&self, spec: &ForwardSpec, request: Request) -> AppResult<Response> {
        let (parts, body) = request.into_parts();
        let url = Self::forward_url(&spec.url, parts.uri.query());

        let original_host = parts.headers.get(HOST).cloned();
        let mut headers = HeaderMap::new();
        for (name, value) in parts.headers.iter() {
            if should_forward_header(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        match &spec.host_header {
            Some(host) => {
                let value = HeaderValue::from_str(host)
                    .map_err(|e| AppError::Upstream(format!("invalid host {:?}: {}", host, e)))?;
                headers.insert(HOST, value);
            }
            None => {
                if let Some(host) = original_host {
                    headers.insert(HOST, host);
                }
            }
        }

        debug!("forwarding {} {} -> {}", parts.method, parts.uri, url);

        let mut outbound = self
            .http_client
            .request(parts.method.clone(), url)
            .headers(headers);
        if should_have_body(&parts.method) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;

        let mut builder = Response::builder().status(upstream.status());
        if let Some(response_headers) = builder.headers_mut() {
            for (name, value) in upstream.headers().iter() {
                if should_forward_header(name) {
                    response_headers.append(name.clone(), value.clone());
                }
            }
        }

        let stream = upstream.bytes_stream().map_err(io::Error::other);
        builder
            .body(Body::from_stream(stream))
            .map_err(|e| AppError::Upstream(format!("failed to build response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_url() {
        let url1 = UpstreamClient::forward_url("https://enjoyjuicy.com/users", None);
        assert_eq!(url1, "https://enjoyjuicy.com/users");

        let url2 = UpstreamClient::forward_url("https://enjoyjuicy.com/users", Some("page=2"));
        assert_eq!(url2, "https://enjoyjuicy.com/users?page=2");
    }

    #[test]
    fn test_hop_by_hop_headers_not_forwarded() {
        assert!(!should_forward_header(&HeaderName::from_static("host")));
        assert!(!should_forward_header(&HeaderName::from_static("connection")));
        assert!(!should_forward_header(&HeaderName::from_static(
            "transfer-encoding"
        )));
        assert!(should_forward_header(&HeaderName::from_static(
            "content-type"
        )));
        assert!(should_forward_header(&HeaderName::from_static("accept")));
    }

    #[test]
    fn test_body_only_for_write_methods() {
        assert!(should_have_body(&Method::POST));
        assert!(should_have_body(&Method::PUT));
        assert!(should_have_body(&Method::PATCH));
        assert!(!should_have_body(&Method::GET));
        assert!(!should_have_body(&Method::HEAD));
    }
}
