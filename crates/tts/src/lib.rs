#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod artifact;
mod cleanup;
mod dispatcher;
mod emotion;
mod engine;
mod error;
mod http_client;
mod request;
mod server;
mod staging;
mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

pub use artifact::{
    AUDIO_CONTENT_TYPE, ArtifactMeta, ArtifactStore, AudioArtifact, OpenArtifact, SynthesisTask, TaskId, TaskStatus,
};
pub use cleanup::{CleanupScheduler, CleanupWorker, StagedInputs};
pub use dispatcher::{Dispatcher, EngineStatus};
pub use emotion::{
    EMOTION_DIMENSIONS, EmotionConfig, EmotionControl, EmotionMode, EmotionRequest, EmotionResolution, EmotionVector,
};
pub use engine::{EngineError, InferenceJob, InferenceParams, SpeechEngine};
pub use error::{Result, TtsError};
pub use request::ExtractSynthesisForm;
pub use server::{Server, SynthesisOutcome, TtsServerBuilder};
pub use staging::{StagedFile, StagedOrigin, Stager, Upload};
pub use types::{GenerationOptions, SynthesisForm, SynthesisParams, SynthesisResponse, SynthesisUploads};

/// Task identifier of the synthesized audio
pub const X_TASK_ID: &str = "x-task-id";
/// Emotion mode the engine actually used
pub const X_EMOTION_MODE: &str = "x-emotion-mode";
/// `true` when the requested emotion mode fell back to same-timbre
pub const X_EMOTION_FALLBACK: &str = "x-emotion-fallback";

/// Create the endpoint router for synthesis and audio retrieval
pub fn endpoint_router() -> Router<Arc<Server>> {
    Router::new()
        .route("/tts", post(synthesize))
        .route("/tts/audio", post(synthesize_audio))
        .route("/audio/{task_id}", get(get_audio).head(head_audio))
        // The synthesis extractor enforces the configured limit itself
        .layer(DefaultBodyLimit::disable())
}

/// Synthesize and answer with a JSON envelope pointing at the audio
async fn synthesize(
    State(server): State<Arc<Server>>,
    ExtractSynthesisForm(form): ExtractSynthesisForm,
) -> Result<Json<SynthesisResponse>> {
    let outcome = server.synthesize(form).await?;

    Ok(Json(outcome.to_response()))
}

/// Synthesize and answer with the audio bytes
async fn synthesize_audio(
    State(server): State<Arc<Server>>,
    ExtractSynthesisForm(form): ExtractSynthesisForm,
) -> Result<Response> {
    let outcome = server.synthesize(form).await?;
    let artifact = server.open_artifact(outcome.task.id()).await?;

    let mut headers = audio_headers(artifact.meta());
    let id = outcome.task.id();

    headers.insert(X_TASK_ID, header_value(id.to_string())?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(format!("inline; filename=\"{id}.wav\""))?,
    );
    let effective_mode: &'static str = outcome.emotion.effective_mode().into();
    headers.insert(X_EMOTION_MODE, HeaderValue::from_static(effective_mode));
    headers.insert(
        X_EMOTION_FALLBACK,
        HeaderValue::from_static(if outcome.emotion.is_degraded() { "true" } else { "false" }),
    );

    Ok((StatusCode::OK, headers, artifact.into_body()).into_response())
}

async fn get_audio(State(server): State<Arc<Server>>, Path(task_id): Path<String>) -> Result<Response> {
    let artifact = server.open_artifact(task_id.parse()?).await?;
    let headers = audio_headers(artifact.meta());

    Ok((StatusCode::OK, headers, artifact.into_body()).into_response())
}

async fn head_audio(State(server): State<Arc<Server>>, Path(task_id): Path<String>) -> Result<Response> {
    let artifact = server.open_artifact(task_id.parse()?).await?;
    let headers = audio_headers(artifact.meta());

    Ok((StatusCode::OK, headers, Body::empty()).into_response())
}

fn audio_headers(meta: ArtifactMeta) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(meta.content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    headers
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::try_from(value).map_err(|e| TtsError::Storage(format!("invalid header value: {e}")))
}
