use std::{sync::OnceLock, time::Duration};

use axum::http;
use reqwest::Client;

/// Shared client so jobs to the inference worker reuse connections
///
/// Per-request timeouts are set by the caller; synthesis can take minutes.
pub fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            let mut headers = http::HeaderMap::new();
            headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

            Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Some(Duration::from_secs(30)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .default_headers(headers)
                .build()
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to build tuned HTTP client, using defaults");
                    Client::new()
                })
        })
        .clone()
}
