//! Task identifiers and persisted synthesis output

use std::{
    fmt,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use axum::body::Body;
use jiff::Timestamp;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{Result, TtsError};

/// Content type of every artifact
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Random, unguessable identifier shared by a task and its artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TaskId {
    type Err = TtsError;

    /// Anything that is not a UUID cannot name an artifact
    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|_| TtsError::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One synthesis request's bookkeeping
#[derive(Debug, Clone)]
pub struct SynthesisTask {
    id: TaskId,
    created_at: Timestamp,
    status: TaskStatus,
    scratch_path: PathBuf,
    output_path: PathBuf,
}

impl SynthesisTask {
    pub const fn id(&self) -> TaskId {
        self.id
    }

    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Where the engine writes; never served
    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Move a pending task to a terminal status. Terminal tasks stay as they are.
    pub fn complete(&mut self, status: TaskStatus) {
        if self.status != TaskStatus::Pending {
            tracing::warn!(task_id = %self.id, current = ?self.status, requested = ?status, "ignoring transition of finished task");
            return;
        }

        self.status = status;
    }
}

/// A finalized, servable synthesis result
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub id: TaskId,
    pub size: u64,
    pub content_type: &'static str,
    pub path: PathBuf,
    /// Length in seconds, when the header could be decoded
    pub duration: Option<f64>,
}

/// Size and type of a stored artifact, taken from one open handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub size: u64,
    pub content_type: &'static str,
}

/// An artifact opened for serving
#[derive(Debug)]
pub struct OpenArtifact {
    meta: ArtifactMeta,
    file: tokio::fs::File,
}

impl OpenArtifact {
    pub const fn meta(&self) -> ArtifactMeta {
        self.meta
    }

    /// Stream the file contents from the handle the metadata came from
    pub fn into_body(self) -> Body {
        Body::from_stream(ReaderStream::new(self.file))
    }
}

/// Output directory keyed by task identifier
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory when missing
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    /// Start a pending task with fresh paths
    pub fn allocate(&self) -> SynthesisTask {
        let id = TaskId::new();

        SynthesisTask {
            id,
            created_at: Timestamp::now(),
            status: TaskStatus::Pending,
            scratch_path: self.output_dir.join(format!(".{id}.partial.wav")),
            output_path: self.artifact_path(id),
        }
    }

    fn artifact_path(&self, id: TaskId) -> PathBuf {
        self.output_dir.join(format!("{id}.wav"))
    }

    /// Check the engine output and publish it under the task identifier
    pub async fn finalize(&self, id: TaskId, source: &Path) -> Result<AudioArtifact> {
        let probe_path = source.to_path_buf();

        let duration = tokio::task::spawn_blocking(move || inspect_wav(&probe_path))
            .await
            .map_err(|e| TtsError::Storage(format!("audio inspection task failed: {e}")))??;

        let path = self.artifact_path(id);

        tokio::fs::rename(source, &path)
            .await
            .map_err(|e| TtsError::Storage(format!("failed to publish {}: {e}", path.display())))?;

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| TtsError::Storage(format!("failed to stat {}: {e}", path.display())))?
            .len();

        tracing::debug!(task_id = %id, size, ?duration, "artifact finalized");

        Ok(AudioArtifact {
            id,
            size,
            content_type: AUDIO_CONTENT_TYPE,
            path,
            duration,
        })
    }

    /// Remove a scratch output that will never be finalized
    pub async fn discard(&self, source: &Path) {
        match tokio::fs::remove_file(source).await {
            Ok(()) => tracing::debug!(path = %source.display(), "discarded partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %source.display(), error = %e, "failed to discard partial output"),
        }
    }

    /// Open an artifact and read its metadata from the same handle
    pub async fn open(&self, id: TaskId) -> Result<OpenArtifact> {
        let path = self.artifact_path(id);

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(TtsError::NotFound),
            Err(e) => return Err(TtsError::Storage(format!("failed to open {}: {e}", path.display()))),
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| TtsError::Storage(format!("failed to stat {}: {e}", path.display())))?;

        if !metadata.is_file() {
            return Err(TtsError::NotFound);
        }

        Ok(OpenArtifact {
            meta: ArtifactMeta {
                size: metadata.len(),
                content_type: AUDIO_CONTENT_TYPE,
            },
            file,
        })
    }

    /// Metadata plus a body streaming the artifact
    pub async fn read(&self, id: TaskId) -> Result<(ArtifactMeta, Body)> {
        let artifact = self.open(id).await?;
        let meta = artifact.meta();

        Ok((meta, artifact.into_body()))
    }
}

/// Require a RIFF/WAVE header and decode the duration when hound can
fn inspect_wav(path: &Path) -> Result<Option<f64>> {
    let mut header = [0_u8; 12];

    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map_err(|e| TtsError::SynthesisFailure(format!("engine produced no readable audio: {e}")))?;

    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(TtsError::SynthesisFailure(
            "engine output is not a WAV file".to_string(),
        ));
    }

    let duration = match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            (spec.sample_rate > 0).then(|| f64::from(reader.duration()) / f64::from(spec.sample_rate))
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not decode WAV duration");
            None
        }
    };

    Ok(duration)
}
