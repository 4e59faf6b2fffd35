use serde::Deserialize;

use super::exporters::ExporterConfig;

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Override the default exporter for metrics
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
    /// Export interval in seconds when the exporter sets no batch delay
    #[serde(default = "default_interval")]
    pub interval: u64,
}

#[allow(clippy::missing_const_for_fn)]
fn default_interval() -> u64 {
    30
}
