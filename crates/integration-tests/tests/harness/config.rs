//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use intone_config::{Config, CorsConfig, HealthConfig, ServerConfig, StorageConfig};

use super::storage::TestStorage;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config rooted in the given storage
    pub fn new(storage: &TestStorage) -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                    ..ServerConfig::default()
                },
                storage: StorageConfig {
                    upload_dir: storage.upload_dir(),
                    output_dir: storage.output_dir(),
                    default_speaker: storage.default_speaker(),
                },
                engine: None,
                telemetry: None,
            },
        }
    }

    /// Set CORS configuration
    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    /// Limit synthesis request bodies
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.config.server.body_limit_bytes = bytes;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
