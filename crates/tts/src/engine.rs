//! The synthesis engine seam
//!
//! The engine is a black box that reads reference audio, writes a WAV file
//! to the job's output path, and either succeeds or fails with a message.

pub(crate) mod command;
pub(crate) mod http;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use intone_config::EngineConfig;
use serde::Serialize;
use thiserror::Error;

use crate::{
    emotion::{EmotionConfig, EmotionControl},
    types::GenerationOptions,
};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine cannot take jobs (missing checkpoints, worker down, ...)
    #[error("{0}")]
    Unavailable(String),

    /// The engine ran and failed
    #[error("{0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One synthesis call, in the keyword names the model itself uses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceJob {
    pub spk_audio_prompt: PathBuf,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_audio_prompt: Option<PathBuf>,
    #[serde(flatten)]
    pub params: InferenceParams,
}

/// Job parameters that do not reference local files
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceParams {
    pub text: String,
    pub emo_alpha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_vector: Option<[f64; 8]>,
    pub use_emo_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_text: Option<String>,
    pub use_random: bool,
    pub max_text_tokens_per_segment: u32,
    pub verbose: bool,
}

impl InferenceJob {
    /// Flatten a resolved emotion configuration into engine arguments
    pub fn new(
        reference_audio: PathBuf,
        text: String,
        emotion: &EmotionConfig,
        options: &GenerationOptions,
        output_path: PathBuf,
    ) -> Self {
        let mut params = InferenceParams {
            text,
            emo_alpha: emotion.weight,
            emo_vector: None,
            use_emo_text: false,
            emo_text: None,
            use_random: options.use_random,
            max_text_tokens_per_segment: options.max_text_tokens_per_segment,
            verbose: options.verbose,
        };

        let mut emo_audio_prompt = None;

        match &emotion.control {
            EmotionControl::SameTimbre => {}
            EmotionControl::ReferenceAudio(path) => emo_audio_prompt = Some(path.clone()),
            EmotionControl::Vector(vector) => params.emo_vector = Some(*vector.values()),
            EmotionControl::DescriptiveText(text) => {
                params.use_emo_text = true;
                params.emo_text = Some(text.clone());
            }
        }

        Self {
            spk_audio_prompt: reference_audio,
            output_path,
            emo_audio_prompt,
            params,
        }
    }
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Adapter name for logs and metrics
    fn name(&self) -> &str;

    /// Check once at startup whether the engine can take jobs
    async fn probe(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Run one job; on success a WAV file exists at `job.output_path`
    async fn infer(&self, job: &InferenceJob) -> Result<(), EngineError>;
}

/// Build the configured adapter
pub fn from_config(config: &EngineConfig) -> Result<Arc<dyn SpeechEngine>, EngineError> {
    let engine: Arc<dyn SpeechEngine> = match config {
        EngineConfig::Command(config) => Arc::new(command::CommandEngine::new(config.clone())),
        EngineConfig::Http(config) => Arc::new(http::HttpEngine::new(config)?),
    };

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::emotion::EmotionRequest;

    fn job(mode: i64, vector: Option<&[f64]>, text: Option<&str>, reference: Option<&Path>) -> InferenceJob {
        let resolution = EmotionRequest::new(mode, 0.7, vector, text.map(str::to_string))
            .unwrap()
            .resolve(reference);

        InferenceJob::new(
            PathBuf::from("uploads/lyq_01.wav"),
            "hello".into(),
            &resolution.config,
            &GenerationOptions::default(),
            PathBuf::from("outputs/.x.partial.wav"),
        )
    }

    #[test]
    fn same_timbre_sets_no_emotion_fields() {
        let json = serde_json::to_value(job(0, None, None, None)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "spk_audio_prompt": "uploads/lyq_01.wav",
                "output_path": "outputs/.x.partial.wav",
                "text": "hello",
                "emo_alpha": 0.7,
                "use_emo_text": false,
                "use_random": false,
                "max_text_tokens_per_segment": 120,
                "verbose": false,
            })
        );
    }

    #[test]
    fn vector_reaches_job_unchanged() {
        let values = [0.0, 0.2, 0.0, 0.0, 0.0, 0.0, 0.45, 1.0];
        let job = job(2, Some(&values), None, None);

        assert_eq!(job.params.emo_vector, Some(values));
        assert_eq!(job.emo_audio_prompt, None);
        assert!(!job.params.use_emo_text);
    }

    #[test]
    fn descriptive_text_enables_emo_text() {
        let job = job(3, None, Some("whispering, afraid"), None);

        assert!(job.params.use_emo_text);
        assert_eq!(job.params.emo_text.as_deref(), Some("whispering, afraid"));
        assert_eq!(job.params.emo_vector, None);
    }

    #[test]
    fn reference_audio_sets_prompt() {
        let job = job(1, None, None, Some(Path::new("uploads/upload_e.wav")));
        assert_eq!(job.emo_audio_prompt, Some(PathBuf::from("uploads/upload_e.wav")));
    }
}
