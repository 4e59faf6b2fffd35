//! Reference-audio staging
//!
//! Uploads land in the scratch directory under random names. Without an
//! upload, the configured default speaker is used and marked protected so
//! cleanup never touches it.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use intone_config::StorageConfig;

use crate::{
    artifact::TaskId,
    error::{Result, TtsError},
};

const UPLOAD_PREFIX: &str = "upload_";
const UPLOAD_SUFFIX: &str = ".wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedOrigin {
    /// Written for one request and deleted afterwards
    UploadedEphemeral,
    /// The configured default speaker; never deleted
    ProtectedDefault,
}

/// A reference file ready to hand to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    path: PathBuf,
    origin: StagedOrigin,
    task: Option<TaskId>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn origin(&self) -> StagedOrigin {
        self.origin
    }

    pub const fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn is_protected(&self) -> bool {
        self.origin == StagedOrigin::ProtectedDefault
    }

    /// An ephemeral record for a file this service wrote itself
    pub(crate) const fn ephemeral(path: PathBuf, task: Option<TaskId>) -> Self {
        Self {
            path,
            origin: StagedOrigin::UploadedEphemeral,
            task,
        }
    }
}

/// An uploaded file part
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Stager {
    upload_dir: PathBuf,
    default_speaker: PathBuf,
}

impl Stager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            default_speaker: config.default_speaker.clone(),
        }
    }

    /// Create the scratch directory when missing
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn default_speaker(&self) -> &Path {
        &self.default_speaker
    }

    /// Stage the speaker reference, falling back to the default speaker
    pub async fn stage(&self, upload: Option<Upload>, task: TaskId) -> Result<StagedFile> {
        if let Some(upload) = upload {
            return self.stage_upload(upload, task).await;
        }

        let exists = tokio::fs::try_exists(&self.default_speaker)
            .await
            .map_err(|e| TtsError::Storage(format!("failed to check {}: {e}", self.default_speaker.display())))?;

        if !exists {
            return Err(TtsError::Configuration(format!(
                "Default speaker audio not found at '{}'. Upload speakerAudio or install a default reference file.",
                self.default_speaker.display()
            )));
        }

        Ok(StagedFile {
            path: self.default_speaker.clone(),
            origin: StagedOrigin::ProtectedDefault,
            task: Some(task),
        })
    }

    /// Write an upload to a fresh scratch file
    pub async fn stage_upload(&self, upload: Upload, task: TaskId) -> Result<StagedFile> {
        let Upload {
            file_name,
            content_type,
            data,
        } = upload;

        let dir = self.upload_dir.clone();
        let size = data.len();

        let path = tokio::task::spawn_blocking(move || write_upload(&dir, &data))
            .await
            .map_err(|e| TtsError::Storage(format!("upload staging task failed: {e}")))?
            .map_err(|e| TtsError::Storage(format!("failed to stage upload: {e}")))?;

        tracing::debug!(
            task_id = %task,
            path = %path.display(),
            size,
            file_name = file_name.as_deref().unwrap_or("-"),
            content_type = content_type.as_deref().unwrap_or("-"),
            "staged upload"
        );

        Ok(StagedFile::ephemeral(path, Some(task)))
    }
}

/// `tempfile` creates with `O_EXCL` and a random name, then the file is kept
fn write_upload(dir: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .suffix(UPLOAD_SUFFIX)
        .rand_bytes(16)
        .tempfile_in(dir)?;

    file.write_all(data)?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| e.error)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stager(dir: &Path) -> Stager {
        Stager::new(&StorageConfig {
            upload_dir: dir.join("uploads"),
            output_dir: dir.join("outputs"),
            default_speaker: dir.join("uploads/default.wav"),
        })
    }

    fn upload(data: &'static [u8]) -> Upload {
        Upload {
            file_name: Some("voice.wav".into()),
            content_type: Some("audio/wav".into()),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn upload_is_written_as_ephemeral() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(dir.path());
        stager.prepare().await.unwrap();

        let task = TaskId::new();
        let staged = stager.stage(Some(upload(b"RIFF")), task).await.unwrap();

        assert_eq!(staged.origin(), StagedOrigin::UploadedEphemeral);
        assert_eq!(staged.task(), Some(task));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"RIFF");

        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(UPLOAD_PREFIX));
        assert!(name.ends_with(UPLOAD_SUFFIX));
        assert!(!name.contains("voice"), "client file name leaked into {name}");
    }

    #[tokio::test]
    async fn concurrent_uploads_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(dir.path());
        stager.prepare().await.unwrap();

        let handles = (0..32)
            .map(|_| {
                let stager = stager.clone();
                tokio::spawn(async move { stager.stage_upload(upload(b"x"), TaskId::new()).await })
            })
            .collect::<Vec<_>>();

        let mut paths = std::collections::HashSet::new();
        for handle in handles {
            let staged = handle.await.unwrap().unwrap();
            assert!(paths.insert(staged.path().to_path_buf()));
        }

        assert_eq!(paths.len(), 32);
    }

    #[tokio::test]
    async fn missing_default_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(dir.path());
        stager.prepare().await.unwrap();

        let err = stager.stage(None, TaskId::new()).await.unwrap_err();
        assert!(matches!(err, TtsError::Configuration(_)));
    }

    #[tokio::test]
    async fn default_speaker_is_protected() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(dir.path());
        stager.prepare().await.unwrap();
        std::fs::write(stager.default_speaker(), b"RIFF").unwrap();

        let staged = stager.stage(None, TaskId::new()).await.unwrap();

        assert!(staged.is_protected());
        assert_eq!(staged.path(), stager.default_speaker());
    }
}
