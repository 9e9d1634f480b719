//! Run-scoped staging directory for extracted token files and trained models.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{IntervecError, Result};

/// Extension given to staged model files.
pub const MODEL_EXTENSION: &str = "model";

/// Private temporary directory owned by one pipeline run.
///
/// Backed by [`tempfile::TempDir`], so the directory and everything left in it
/// are removed when the value drops, on every exit path.  The success path
/// calls [`StagingArea::close`] instead to surface removal errors.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Creates a fresh staging directory under `base`.
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref();
        let dir = tempfile::Builder::new()
            .prefix("intervec-")
            .tempdir_in(base)
            .map_err(|err| IntervecError::io(err, Some(base.to_path_buf())))?;
        Ok(Self { dir })
    }

    /// Path of the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path a model for `base_name` will be staged at.
    #[must_use]
    pub fn model_path(&self, base_name: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{base_name}.{MODEL_EXTENSION}"))
    }

    /// Staged model files, in directory enumeration order.
    ///
    /// That order is implementation defined and not guaranteed to match the
    /// source archive's listing order; consumers rely on member names only.
    pub fn model_files(&self) -> Result<Vec<PathBuf>> {
        let mut models = Vec::new();
        let entries = fs::read_dir(self.dir.path())
            .map_err(|err| IntervecError::io(err, Some(self.dir.path().to_path_buf())))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| IntervecError::io(err, Some(self.dir.path().to_path_buf())))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
                models.push(path);
            }
        }
        Ok(models)
    }

    /// Removes one staged file.
    pub fn remove(&self, staged: &Path) -> Result<()> {
        fs::remove_file(staged).map_err(|err| IntervecError::io(err, Some(staged.to_path_buf())))
    }

    /// Removes the staging directory, surfacing any IO error.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|err| IntervecError::io(err, Some(path)))
    }
}
