//! Per-run scratch directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::docker::WORKDIR_PREFIX;
use crate::error::Result;

use super::RunnerKind;

/// Temporary directory removed when dropped.
///
/// Named `pgcompat-<kind>-XXXXXX` so the cleanup utility can find it if
/// the process dies before the drop runs.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a directory under the system temp dir.
    pub fn create(kind: RunnerKind) -> Result<Self> {
        Self::create_in(kind, &std::env::temp_dir())
    }

    /// Create a directory under `parent`.
    pub fn create_in(kind: RunnerKind, parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", WORKDIR_PREFIX, kind.name()))
            .tempdir_in(parent)?;
        tracing::debug!("Created working directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file inside the directory.
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("Removed working directory {}", path.display());
        Ok(())
    }
}
