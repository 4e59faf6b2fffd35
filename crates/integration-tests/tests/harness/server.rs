//! Test server wrapper that starts intone on a random port

use std::{net::SocketAddr, sync::Arc};

use intone_config::Config;
use intone_server::Server;
use tokio_util::sync::CancellationToken;

use super::mock_engine::MockEngine;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server; without an engine the model reports not loaded
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config, engine: Option<Arc<MockEngine>>) -> anyhow::Result<Self> {
        let mut builder = Server::builder(config);
        if let Some(engine) = engine {
            builder = builder.engine(engine);
        }

        let server = builder.build().await?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self { addr, shutdown, client })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Post a multipart form to a synthesis endpoint
    pub async fn synthesize(&self, path: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("request sent")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
