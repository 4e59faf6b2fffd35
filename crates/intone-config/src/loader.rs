use std::path::Path;

use crate::{AnyOrArray, Config, EngineConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path fails to load
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::debug!("no config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the storage layout, engine or server settings
    /// are invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_storage()?;
        self.validate_engine()?;
        self.validate_server()?;
        Ok(())
    }

    /// Uploads and outputs must live in separate directories
    fn validate_storage(&self) -> anyhow::Result<()> {
        let storage = &self.storage;

        if storage.upload_dir == storage.output_dir {
            anyhow::bail!("storage.upload_dir and storage.output_dir must be different directories");
        }

        if storage.default_speaker.as_os_str().is_empty() {
            anyhow::bail!("storage.default_speaker must not be empty");
        }

        Ok(())
    }

    fn validate_engine(&self) -> anyhow::Result<()> {
        match &self.engine {
            None => Ok(()),
            Some(EngineConfig::Command(command)) => {
                if command.command.trim().is_empty() {
                    anyhow::bail!("engine.command must not be empty");
                }
                Ok(())
            }
            Some(EngineConfig::Http(http)) => {
                if http.timeout_duration()?.is_zero() {
                    anyhow::bail!("engine.timeout must be greater than 0");
                }
                Ok(())
            }
        }
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        let server = &self.server;

        if server.body_limit_bytes == 0 {
            anyhow::bail!("server.body_limit_bytes must be greater than 0");
        }

        if server.health.enabled && !server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        if let Some(ref cors) = server.cors
            && cors.credentials
            && [&cors.origins, &cors.methods, &cors.headers].contains(&&AnyOrArray::Any)
        {
            anyhow::bail!("server.cors.credentials cannot be combined with wildcard origins, methods or headers");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, path::PathBuf};

    use indoc::indoc;

    use crate::{Config, EngineConfig};

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert!(config.engine.is_none());
        assert!(config.server.health.enabled);
        assert_eq!(config.server.health.path, "/health");
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.storage.default_speaker, PathBuf::from("uploads/lyq_01.wav"));
    }

    #[test]
    fn full_config() {
        let config = Config::from_toml(indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8000"
            body_limit_bytes = 1048576

            [server.cors]
            origins = ["https://studio.example"]
            methods = ["GET", "HEAD", "POST"]
            headers = ["content-type"]
            credentials = true

            [storage]
            upload_dir = "/var/lib/intone/uploads"
            output_dir = "/var/lib/intone/outputs"
            default_speaker = "/var/lib/intone/voices/default.wav"

            [engine]
            type = "command"
            command = "python"
            args = ["tools/infer_job.py"]
            model_dir = "/models/index-tts"
        "#})
        .unwrap();

        assert_eq!(
            config.server.listen_address,
            Some(SocketAddr::from(([127, 0, 0, 1], 8000)))
        );
        assert_eq!(config.server.body_limit_bytes, 1 << 20);
        assert_eq!(
            config.storage.default_speaker,
            PathBuf::from("/var/lib/intone/voices/default.wav")
        );

        let Some(EngineConfig::Command(command)) = config.engine else {
            panic!("expected command engine");
        };
        assert_eq!(command.model_dir, PathBuf::from("/models/index-tts"));
    }

    #[test]
    fn env_placeholders_expand_before_parsing() {
        temp_env::with_var("INTONE_TEST_WORKER", Some("http://10.0.0.7:9000"), || {
            let config = Config::from_toml(indoc! {r#"
                [engine]
                type = "http"
                base_url = "{{ env.INTONE_TEST_WORKER }}"
            "#})
            .unwrap();

            let Some(EngineConfig::Http(http)) = config.engine else {
                panic!("expected http engine");
            };
            assert_eq!(http.base_url.as_str(), "http://10.0.0.7:9000/");
        });
    }

    #[test]
    fn shared_upload_and_output_dir_rejected() {
        let err = Config::from_toml(indoc! {r#"
            [storage]
            upload_dir = "data"
            output_dir = "data"
        "#})
        .unwrap_err();

        insta::assert_snapshot!(err.to_string(), @"storage.upload_dir and storage.output_dir must be different directories");
    }

    #[test]
    fn blank_command_rejected() {
        let err = Config::from_toml(indoc! {r#"
            [engine]
            type = "command"
            command = "  "
        "#})
        .unwrap_err();

        insta::assert_snapshot!(err.to_string(), @"engine.command must not be empty");
    }

    #[test]
    fn credentials_with_wildcard_origin_rejected() {
        let err = Config::from_toml(indoc! {r#"
            [server.cors]
            credentials = true
        "#})
        .unwrap_err();

        insta::assert_snapshot!(err.to_string(), @"server.cors.credentials cannot be combined with wildcard origins, methods or headers");
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(Config::from_toml("[queue]\nworkers = 2\n").is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intone.toml");
        std::fs::write(&path, "[server.health]\npath = \"/healthz\"\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.server.health.path, "/healthz");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
