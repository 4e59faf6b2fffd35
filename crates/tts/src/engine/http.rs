use std::{path::Path, time::Duration};

use async_trait::async_trait;
use intone_config::HttpEngineConfig;
use reqwest::{
    Client, RequestBuilder, Response,
    multipart::{Form, Part},
};
use secrecy::{ExposeSecret, SecretString};

use super::{EngineError, InferenceJob, SpeechEngine};
use crate::{artifact::AUDIO_CONTENT_TYPE, http_client::http_client};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards jobs to a remote inference worker
pub(crate) struct HttpEngine {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpEngine {
    pub fn new(config: &HttpEngineConfig) -> Result<Self, EngineError> {
        let timeout = config
            .timeout_duration()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(Self {
            client: http_client(),
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

async fn audio_part(path: &Path) -> Result<Part, EngineError> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map_or_else(|| "reference.wav".to_string(), |name| name.to_string_lossy().into_owned());

    Part::bytes(data)
        .file_name(file_name)
        .mime_str(AUDIO_CONTENT_TYPE)
        .map_err(|e| EngineError::Inference(format!("invalid audio part: {e}")))
}

/// Pull a readable message out of a worker error body
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = serde_json::from_str::<serde_json::Value>(&body).ok().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("detail"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    });

    match detail {
        Some(detail) => format!("worker returned {status}: {detail}"),
        None if body.trim().is_empty() => format!("worker returned {status}"),
        None => format!("worker returned {status}: {}", body.trim()),
    }
}

#[async_trait]
impl SpeechEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn probe(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(format!("worker at {url} unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Unavailable(error_message(response).await));
        }

        Ok(())
    }

    async fn infer(&self, job: &InferenceJob) -> Result<(), EngineError> {
        let url = format!("{}/infer", self.base_url);

        let params = serde_json::to_string(&job.params)
            .map_err(|e| EngineError::Inference(format!("failed to encode job: {e}")))?;

        let mut form = Form::new()
            .text("job", params)
            .part("spk_audio_prompt", audio_part(&job.spk_audio_prompt).await?);

        if let Some(path) = &job.emo_audio_prompt {
            form = form.part("emo_audio_prompt", audio_part(path).await?);
        }

        tracing::debug!(url = %url, text_len = job.params.text.chars().count(), "forwarding job to worker");

        let response = self
            .authorize(self.client.post(&url))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::Inference(format!("worker request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Inference(error_message(response).await));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| EngineError::Inference(format!("failed to read worker audio: {e}")))?;

        tokio::fs::write(&job.output_path, &audio).await?;

        Ok(())
    }
}
