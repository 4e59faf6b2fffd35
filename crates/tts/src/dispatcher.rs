//! Serialized access to the synthesis engine

use std::{path::PathBuf, sync::Arc, time::Instant};

use intone_telemetry::metrics;
use opentelemetry::KeyValue;
use tokio::sync::Mutex;

use crate::{
    emotion::EmotionConfig,
    engine::{InferenceJob, SpeechEngine},
    error::{Result, TtsError},
    types::GenerationOptions,
};

/// Engine readiness, settled once at startup
pub enum EngineStatus {
    Ready(Arc<dyn SpeechEngine>),
    Unavailable { reason: String },
}

/// Owns the engine handle and the single slot every job must hold
pub struct Dispatcher {
    status: EngineStatus,
    slot: Arc<Mutex<()>>,
}

impl Dispatcher {
    /// Probe the engine once and record the outcome
    pub async fn start(engine: Option<Arc<dyn SpeechEngine>>) -> Self {
        let status = match engine {
            None => {
                tracing::warn!("no synthesis engine configured, synthesis requests will be rejected");
                EngineStatus::Unavailable {
                    reason: "no engine configured".to_string(),
                }
            }
            Some(engine) => match engine.probe().await {
                Ok(()) => {
                    tracing::info!(engine = engine.name(), "synthesis engine ready");
                    EngineStatus::Ready(engine)
                }
                Err(e) => {
                    tracing::warn!(engine = engine.name(), error = %e, "synthesis engine unavailable");
                    EngineStatus::Unavailable { reason: e.to_string() }
                }
            },
        };

        Self {
            status,
            slot: Arc::new(Mutex::new(())),
        }
    }

    /// A dispatcher whose engine could not be built
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: EngineStatus::Unavailable { reason: reason.into() },
            slot: Arc::new(Mutex::new(())),
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self.status, EngineStatus::Ready(_))
    }

    /// Why the engine is not ready, if it is not
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.status {
            EngineStatus::Ready(_) => None,
            EngineStatus::Unavailable { reason } => Some(reason),
        }
    }

    /// Run one job through the engine, waiting for the slot first
    ///
    /// The job runs on a spawned task that owns the slot, so a caller that
    /// goes away does not release the engine early or cut the job short.
    pub async fn synthesize(
        &self,
        reference_audio: PathBuf,
        text: String,
        emotion: &EmotionConfig,
        options: &GenerationOptions,
        output_path: PathBuf,
    ) -> Result<()> {
        let EngineStatus::Ready(engine) = &self.status else {
            return Err(TtsError::EngineNotReady);
        };

        let job = InferenceJob::new(reference_audio, text, emotion, options, output_path);
        let engine = Arc::clone(engine);
        let slot = Arc::clone(&self.slot);

        let handle = tokio::spawn(async move {
            let queued = Instant::now();
            let _slot = slot.lock_owned().await;

            let engine_name = KeyValue::new("engine", engine.name().to_string());
            let instruments = metrics::synthesis();
            metrics::record_duration(&instruments.queue_wait, queued, std::slice::from_ref(&engine_name));

            let started = Instant::now();
            let result = engine.infer(&job).await;

            let outcome = if result.is_ok() { "success" } else { "failure" };
            let attributes = [engine_name, KeyValue::new("outcome", outcome)];
            instruments.synthesis_count.add(1, &attributes);
            metrics::record_duration(&instruments.synthesis_duration, started, &attributes);

            tracing::debug!(
                outcome,
                queue_wait_ms = started.duration_since(queued).as_millis(),
                elapsed_ms = started.elapsed().as_millis(),
                "engine job finished"
            );

            result
        });

        handle
            .await
            .map_err(|e| TtsError::SynthesisFailure(format!("engine task aborted: {e}")))?
            .map_err(|e| TtsError::SynthesisFailure(e.to_string()))
    }
}
