#![allow(clippy::must_use_candidate)]

pub mod cors;
pub mod engine;
mod env;
pub mod health;
mod loader;
pub mod server;
pub mod storage;
pub mod telemetry;

use serde::Deserialize;

pub use cors::*;
pub use engine::*;
pub use health::*;
pub use server::*;
pub use storage::*;
pub use telemetry::TelemetryConfig;

/// Top-level intone configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upload, output and default reference locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Synthesis engine adapter
    ///
    /// When absent the service still starts, but reports the model as not
    /// loaded and rejects synthesis requests.
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
