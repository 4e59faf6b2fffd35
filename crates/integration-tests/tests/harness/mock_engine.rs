//! In-process synthesis engine that writes a real WAV file

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tts::{EngineError, InferenceJob, SpeechEngine};

use super::storage::wav_bytes;

/// Samples per generated clip (0.25s at 16 kHz)
pub const MOCK_SAMPLES: u32 = 4_000;

#[derive(Default)]
pub struct MockEngine {
    delay: Duration,
    failure: Option<String>,
    probe_failure: Option<String>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    jobs: Mutex<Vec<InferenceJob>>,
    missing_inputs: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the engine for a while on every job
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every job with this message
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Fail the startup probe
    pub fn not_ready(mut self, reason: &str) -> Self {
        self.probe_failure = Some(reason.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn jobs(&self) -> Vec<InferenceJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn last_job(&self) -> InferenceJob {
        self.jobs.lock().unwrap().last().cloned().expect("engine was called")
    }

    /// Highest number of jobs observed inside the engine at once
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Jobs whose reference files were gone by the time the engine ran
    pub fn missing_inputs(&self) -> usize {
        self.missing_inputs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> Result<(), EngineError> {
        match &self.probe_failure {
            Some(reason) => Err(EngineError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn infer(&self, job: &InferenceJob) -> Result<(), EngineError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        self.jobs.lock().unwrap().push(job.clone());

        let inputs = std::iter::once(&job.spk_audio_prompt).chain(job.emo_audio_prompt.as_ref());
        if inputs.into_iter().any(|path| !path.exists()) {
            self.missing_inputs.fetch_add(1, Ordering::SeqCst);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match &self.failure {
            Some(message) => Err(EngineError::Inference(message.clone())),
            None => tokio::fs::write(&job.output_path, wav_bytes(MOCK_SAMPLES))
                .await
                .map_err(EngineError::from),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);

        result
    }
}
