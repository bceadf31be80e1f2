//! Advisory lock file guarding one document's read-modify-write.

use fs2::FileExt;
use postcrew_core::Result;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock held until drop.
pub struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Block until the lock at `path` is ours. The lock file is created on
    /// first use and left in place afterwards.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        debug!("locked {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Non-blocking variant. `None` when another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
