//! Exclusive advisory locks scoped to one release directory.

use anyhow::{Context, Result};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::RealRuntime;

/// Guard for an exclusive lock file. The lock is released on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    file: Option<File>,
}

impl DirLock {
    /// A guard that holds no OS lock, for mocked runtimes.
    #[cfg(test)]
    pub(crate) fn detached(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            debug!("Releasing lock {:?}", self.path);
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to release lock {:?}: {}", self.path, e);
            }
        }
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn lock_exclusive_impl(&self, path: &Path) -> Result<DirLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .context("Failed to open lock file")?;
        debug!("Waiting for lock {:?}", path);
        file.lock_exclusive().context("Failed to acquire lock")?;
        Ok(DirLock {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }
}
