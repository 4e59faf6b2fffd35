use std::{path::PathBuf, time::Duration};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Checkpoint files the local model needs before it can be loaded
pub const REQUIRED_CHECKPOINT_FILES: [&str; 5] =
    ["config.yaml", "gpt.pth", "s2mel.pth", "bpe.model", "wav2vec2bert_stats.pt"];

/// Synthesis engine adapters
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineConfig {
    /// Spawn a local inference process per job
    Command(CommandEngineConfig),
    /// Forward jobs to a remote inference worker
    Http(HttpEngineConfig),
}

impl EngineConfig {
    /// Short adapter name used in logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Http(_) => "http",
        }
    }
}

/// Local process engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandEngineConfig {
    /// Program to execute (e.g. `python`)
    pub command: String,
    /// Program arguments (e.g. `["tools/infer_job.py"]`)
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child process
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// Working directory for the child process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Directory holding the model checkpoints
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Run inference in half precision
    #[serde(default = "default_use_fp16")]
    pub use_fp16: bool,
    /// Device hint forwarded to the engine (e.g. `cuda:0`)
    #[serde(default)]
    pub device: Option<String>,
}

/// Remote worker engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpEngineConfig {
    /// Base URL of the inference worker
    pub base_url: Url,
    /// Bearer token sent to the worker
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Transport timeout for a single job (e.g. "10m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl HttpEngineConfig {
    /// Parsed transport timeout
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` is not a valid duration string
    pub fn timeout_duration(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.timeout).map_err(|e| anyhow::anyhow!("invalid engine timeout '{}': {e}", self.timeout))
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

#[allow(clippy::missing_const_for_fn)]
fn default_use_fp16() -> bool {
    true
}

fn default_timeout() -> String {
    "10m".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_command_engine() {
        let toml = r#"
            type = "command"
            command = "python"
            args = ["tools/infer_job.py", "--quiet"]
            device = "cuda:0"

            [env]
            HF_HUB_OFFLINE = "1"
        "#;

        let config: EngineConfig = toml::from_str(toml).unwrap();
        let EngineConfig::Command(command) = config else {
            panic!("expected command engine");
        };

        assert_eq!(command.command, "python");
        assert_eq!(command.args, vec!["tools/infer_job.py", "--quiet"]);
        assert_eq!(command.model_dir, PathBuf::from("checkpoints"));
        assert!(command.use_fp16);
        assert_eq!(command.device.as_deref(), Some("cuda:0"));
        assert_eq!(command.env["HF_HUB_OFFLINE"], "1");
    }

    #[test]
    fn deserialize_http_engine() {
        let toml = r#"
            type = "http"
            base_url = "http://127.0.0.1:9000"
            timeout = "90s"
        "#;

        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kind(), "http");

        let EngineConfig::Http(http) = config else {
            panic!("expected http engine");
        };

        assert_eq!(http.base_url.as_str(), "http://127.0.0.1:9000/");
        assert!(http.api_key.is_none());
        assert_eq!(http.timeout_duration().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn http_engine_default_timeout() {
        let toml = r#"
            type = "http"
            base_url = "http://worker:9000"
        "#;

        let EngineConfig::Http(http) = toml::from_str(toml).unwrap() else {
            panic!("expected http engine");
        };

        assert_eq!(http.timeout_duration().unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn unknown_engine_field_rejected() {
        let toml = r#"
            type = "command"
            command = "python"
            gpu = true
        "#;

        assert!(toml::from_str::<EngineConfig>(toml).is_err());
    }
}
