use std::path::PathBuf;

use serde::Deserialize;

/// Filesystem layout for staged uploads and synthesized audio
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Scratch directory for uploaded reference audio
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory holding synthesized audio, one file per task
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Speaker reference used when a request uploads none
    ///
    /// This file is never deleted by cleanup.
    #[serde(default = "default_speaker")]
    pub default_speaker: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            default_speaker: default_speaker(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_speaker() -> PathBuf {
    PathBuf::from("uploads/lyq_01.wav")
}
