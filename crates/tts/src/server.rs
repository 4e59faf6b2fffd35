use std::sync::Arc;

use intone_config::Config;
use intone_telemetry::metrics;
use opentelemetry::KeyValue;
use tracing::Instrument;

use crate::{
    artifact::{ArtifactStore, AudioArtifact, OpenArtifact, SynthesisTask, TaskId, TaskStatus},
    cleanup::{CleanupScheduler, StagedInputs},
    dispatcher::Dispatcher,
    emotion::EmotionResolution,
    engine::{self, SpeechEngine},
    error::{Result, TtsError},
    staging::Stager,
    types::{SynthesisForm, SynthesisParams, SynthesisResponse, SynthesisUploads},
};

/// Orchestrates staging, emotion resolution, dispatch and artifact storage
pub struct Server {
    stager: Stager,
    artifacts: ArtifactStore,
    dispatcher: Dispatcher,
    cleanup: CleanupScheduler,
    body_limit: usize,
}

/// A finished synthesis
#[derive(Debug)]
pub struct SynthesisOutcome {
    pub task: SynthesisTask,
    pub artifact: AudioArtifact,
    pub emotion: EmotionResolution,
}

impl SynthesisOutcome {
    pub fn audio_url(&self) -> String {
        format!("/audio/{}", self.task.id())
    }

    pub fn message(&self) -> String {
        match self.emotion.degraded_from {
            Some(requested) => format!(
                "TTS synthesis completed successfully; emotion mode '{requested}' had no input and fell back to '{}'",
                self.emotion.effective_mode()
            ),
            None => "TTS synthesis completed successfully".to_string(),
        }
    }

    pub fn to_response(&self) -> SynthesisResponse {
        SynthesisResponse {
            success: true,
            audio_url: self.audio_url(),
            task_id: self.task.id().to_string(),
            message: self.message(),
            duration: self.artifact.duration,
            created_at: self.task.created_at(),
            effective_emotion_mode: self.emotion.effective_mode(),
            emotion_fallback: self.emotion.is_degraded(),
            requested_emotion_mode: self.emotion.degraded_from,
        }
    }
}

impl Server {
    /// Whether synthesis requests can be served
    pub const fn engine_ready(&self) -> bool {
        self.dispatcher.is_ready()
    }

    pub fn engine_unavailable_reason(&self) -> Option<&str> {
        self.dispatcher.unavailable_reason()
    }

    /// Maximum accepted synthesis request body
    pub const fn body_limit(&self) -> usize {
        self.body_limit
    }

    /// Validate, stage, synthesize and persist one request
    ///
    /// Once validation passes, the work runs on its own task and completes
    /// even if the caller goes away.
    pub async fn synthesize(self: &Arc<Self>, form: SynthesisForm) -> Result<SynthesisOutcome> {
        if !self.engine_ready() {
            return Err(TtsError::EngineNotReady);
        }

        let (params, uploads) = form.into_parts()?;
        let task = self.artifacts.allocate();

        let span = tracing::info_span!(
            "synthesis",
            task_id = %task.id(),
            emotion_mode = %params.emotion.mode(),
            text_chars = params.text.chars().count(),
        );

        let server = Arc::clone(self);

        tokio::spawn(async move { server.run(task, params, uploads).await }.instrument(span))
            .await
            .map_err(|e| TtsError::SynthesisFailure(format!("synthesis task aborted: {e}")))?
    }

    async fn run(&self, mut task: SynthesisTask, params: SynthesisParams, uploads: SynthesisUploads) -> Result<SynthesisOutcome> {
        // Dropping the guard queues ephemeral inputs for deletion on every exit path
        let mut staged = StagedInputs::new(self.cleanup.clone());

        let speaker = staged.track(self.stager.stage(uploads.speaker, task.id()).await?);

        let emotion_audio = match uploads.emotion {
            Some(upload) => Some(staged.track(self.stager.stage_upload(upload, task.id()).await?)),
            None => None,
        };

        let emotion = params.emotion.resolve(emotion_audio.as_deref());

        if let Some(requested) = emotion.degraded_from {
            metrics::synthesis()
                .emotion_fallbacks
                .add(1, &[KeyValue::new("requested_mode", requested.as_ref().to_string())]);

            tracing::warn!(
                requested = %requested,
                effective = %emotion.effective_mode(),
                "emotion input missing, falling back"
            );
        }

        let dispatched = self
            .dispatcher
            .synthesize(
                speaker,
                params.text,
                &emotion.config,
                &params.options,
                task.scratch_path().to_path_buf(),
            )
            .await;

        let finalized = match dispatched {
            Ok(()) => self.artifacts.finalize(task.id(), task.scratch_path()).await,
            Err(e) => Err(e),
        };

        match finalized {
            Ok(artifact) => {
                task.complete(TaskStatus::Succeeded);

                tracing::info!(size = artifact.size, duration = ?artifact.duration, "synthesis succeeded");

                Ok(SynthesisOutcome {
                    task,
                    artifact,
                    emotion,
                })
            }
            Err(e) => {
                self.artifacts.discard(task.scratch_path()).await;
                task.complete(TaskStatus::Failed);

                tracing::warn!(error = %e, "synthesis failed");

                Err(e)
            }
        }
    }

    /// Open a stored artifact for serving
    pub async fn open_artifact(&self, id: TaskId) -> Result<OpenArtifact> {
        self.artifacts.open(id).await
    }
}

/// Builder for constructing the TTS server from configuration
pub struct TtsServerBuilder<'a> {
    config: &'a Config,
    cleanup: CleanupScheduler,
    engine: Option<Arc<dyn SpeechEngine>>,
}

impl<'a> TtsServerBuilder<'a> {
    pub const fn new(config: &'a Config, cleanup: CleanupScheduler) -> Self {
        Self {
            config,
            cleanup,
            engine: None,
        }
    }

    /// Use this engine instead of the one named in the configuration
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub async fn build(self) -> anyhow::Result<Server> {
        let storage = &self.config.storage;

        let stager = Stager::new(storage);
        stager
            .prepare()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create upload directory {}: {e}", storage.upload_dir.display()))?;

        let artifacts = ArtifactStore::new(&storage.output_dir);
        artifacts
            .prepare()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create output directory {}: {e}", storage.output_dir.display()))?;

        if !tokio::fs::try_exists(stager.default_speaker()).await.unwrap_or(false) {
            tracing::warn!(
                path = %stager.default_speaker().display(),
                "default speaker audio not found, requests without speakerAudio will be rejected"
            );
        }

        let dispatcher = match (self.engine, &self.config.engine) {
            (Some(engine), _) => Dispatcher::start(Some(engine)).await,
            (None, Some(config)) => match engine::from_config(config) {
                Ok(engine) => Dispatcher::start(Some(engine)).await,
                Err(e) => {
                    tracing::warn!(engine = config.kind(), error = %e, "failed to initialize synthesis engine");
                    Dispatcher::unavailable(e.to_string())
                }
            },
            (None, None) => Dispatcher::start(None).await,
        };

        Ok(Server {
            stager,
            artifacts,
            dispatcher,
            cleanup: self.cleanup,
            body_limit: self.config.server.body_limit_bytes,
        })
    }
}
