use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Scoped home for every intermediate artifact a job creates. Dropping the
/// guard removes the directory and its contents on every exit path, so a
/// panic or early return cleans up the same way success does. Retained
/// outputs are written outside the scratch dir before the guard drops.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("speech-job-").tempdir()?;
        debug!("Created scratch dir {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
