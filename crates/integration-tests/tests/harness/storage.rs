//! Temporary storage layout for one test server

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Upload and output directories under a private temp dir
pub struct TestStorage {
    dir: TempDir,
}

impl TestStorage {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("uploads")).expect("create upload dir");

        Self { dir }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    pub fn default_speaker(&self) -> PathBuf {
        self.upload_dir().join("lyq_01.wav")
    }

    /// Install the protected default speaker reference
    pub fn with_default_speaker(self) -> Self {
        std::fs::write(self.default_speaker(), wav_bytes(1_600)).expect("write default speaker");
        self
    }

    /// Ephemeral files currently in the upload directory
    pub fn staged_uploads(&self) -> Vec<PathBuf> {
        let default = self.default_speaker();

        std::fs::read_dir(self.upload_dir())
            .expect("read upload dir")
            .map(|entry| entry.expect("dir entry").path())
            .filter(|path| *path != default)
            .collect()
    }

    /// Wait until the cleanup worker has emptied the upload directory
    pub async fn wait_for_cleanup(&self) -> Vec<PathBuf> {
        for _ in 0..200 {
            let remaining = self.staged_uploads();
            if remaining.is_empty() {
                return remaining;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        self.staged_uploads()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A short silent mono WAV
pub fn wav_bytes(samples: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for _ in 0..samples {
            writer.write_sample(0_i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    cursor.into_inner()
}
