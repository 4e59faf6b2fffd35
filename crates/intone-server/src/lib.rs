//! Route and middleware assembly for the intone service

mod cors;
mod health;
mod root;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use intone_config::Config;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tts::{CleanupScheduler, CleanupWorker, SpeechEngine};

/// Port of the original service
const DEFAULT_PORT: u16 = 8000;

/// How long shutdown waits for queued deletions
const CLEANUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    cleanup: CleanupWorker,
}

/// Builder for [`Server`]
pub struct ServerBuilder {
    config: Config,
    engine: Option<Arc<dyn SpeechEngine>>,
}

impl ServerBuilder {
    /// Use this engine instead of the one named in the configuration
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Build the server
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directories cannot be created
    pub async fn build(self) -> anyhow::Result<Server> {
        let Self { config, engine } = self;

        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));

        let (cleanup, cleanup_worker) = CleanupScheduler::spawn(config.storage.default_speaker.clone());

        let mut tts_builder = tts::TtsServerBuilder::new(&config, cleanup);
        if let Some(engine) = engine {
            tts_builder = tts_builder.engine(engine);
        }

        let tts_state = Arc::new(
            tts_builder
                .build()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize TTS server: {e}"))?,
        );

        let health = &config.server.health;
        let descriptor = root::ServiceDescriptor::new(health.enabled.then(|| health.path.clone()));

        let mut app = Router::new().route("/", get(root::root_handler).with_state(descriptor));

        if health.enabled {
            app = app.route(
                &health.path,
                get(health::health_handler).with_state(Arc::clone(&tts_state)),
            );
        }

        app = app.merge(tts::endpoint_router().with_state(tts_state));

        app = app.layer(TraceLayer::new_for_http());

        // Browser clients call from arbitrary origins, so CORS is always on
        let cors_config = config.server.cors.clone().unwrap_or_default();
        app = app.layer(cors::cors_layer(&cors_config));

        Ok(Server {
            router: app,
            listen_address,
            cleanup: cleanup_worker,
        })
    }
}

impl Server {
    pub const fn builder(config: Config) -> ServerBuilder {
        ServerBuilder { config, engine: None }
    }

    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directories cannot be created
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::builder(config).build().await
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// The cleanup worker keeps running detached. Useful for testing when the
    /// caller manages the listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered, then drains the
    /// cleanup queue.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let Self {
            router,
            listen_address,
            cleanup,
        } = self;

        let listener = tokio::net::TcpListener::bind(listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        cleanup.drain(CLEANUP_DRAIN_TIMEOUT).await;

        Ok(())
    }
}
