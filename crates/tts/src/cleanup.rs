//! Deferred, best-effort deletion of staged inputs
//!
//! Handlers hand their staged files to a [`StagedInputs`] guard. When the
//! guard drops, on success or error, the files are queued for a background
//! worker, so deletion never delays a response and never fails one.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use intone_telemetry::metrics;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::staging::StagedFile;

/// Queues staged files for deletion
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    sender: mpsc::UnboundedSender<Vec<StagedFile>>,
}

/// Handle on the background deletion task
#[derive(Debug)]
pub struct CleanupWorker {
    handle: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Spawn the worker; `protected` is never deleted whatever a file claims
    pub fn spawn(protected: impl Into<PathBuf>) -> (Self, CleanupWorker) {
        let protected: Arc<Path> = Arc::from(protected.into());
        let (sender, receiver) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(receiver, protected));

        (Self { sender }, CleanupWorker { handle })
    }

    /// Queue files for deletion without waiting for it
    pub fn schedule_deletion(&self, files: Vec<StagedFile>) {
        if files.is_empty() {
            return;
        }

        if let Err(e) = self.sender.send(files) {
            tracing::warn!(files = e.0.len(), "cleanup worker stopped, staged files left on disk");
        }
    }
}

impl CleanupWorker {
    /// Wait for queued deletions once every scheduler clone is gone
    pub async fn drain(self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => tracing::debug!("cleanup queue drained"),
            Ok(Err(e)) => tracing::warn!(error = %e, "cleanup worker failed"),
            Err(_) => tracing::warn!("cleanup queue not drained before shutdown"),
        }
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Vec<StagedFile>>, protected: Arc<Path>) {
    let canonical_protected = tokio::fs::canonicalize(&protected).await.ok();

    while let Some(files) = receiver.recv().await {
        for file in files {
            delete(&file, &protected, canonical_protected.as_deref()).await;
        }
    }
}

async fn delete(file: &StagedFile, protected: &Path, canonical_protected: Option<&Path>) {
    let path = file.path();

    if file.is_protected() {
        return;
    }

    if path == protected || is_same_file(path, canonical_protected).await {
        tracing::warn!(path = %path.display(), "refusing to delete protected default speaker");
        return;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), task_id = ?file.task().map(|id| id.to_string()), "deleted staged file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            metrics::synthesis().cleanup_failures.add(1, &[]);
            tracing::warn!(path = %path.display(), error = %e, "failed to delete staged file");
        }
    }
}

async fn is_same_file(path: &Path, canonical_protected: Option<&Path>) -> bool {
    let Some(canonical_protected) = canonical_protected else {
        return false;
    };

    tokio::fs::canonicalize(path)
        .await
        .is_ok_and(|canonical| canonical == canonical_protected)
}

/// Staged inputs of one request, scheduled for deletion on drop
#[derive(Debug)]
pub struct StagedInputs {
    files: Vec<StagedFile>,
    scheduler: CleanupScheduler,
}

impl StagedInputs {
    pub const fn new(scheduler: CleanupScheduler) -> Self {
        Self {
            files: Vec::new(),
            scheduler,
        }
    }

    /// Take ownership of a staged file and return its path
    pub fn track(&mut self, file: StagedFile) -> PathBuf {
        let path = file.path().to_path_buf();
        self.files.push(file);
        path
    }
}

impl Drop for StagedInputs {
    fn drop(&mut self) {
        self.scheduler.schedule_deletion(std::mem::take(&mut self.files));
    }
}
