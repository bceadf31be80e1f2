//! Whole-document load/save with atomic promotion and locked updates.

use crate::lock::DocumentLock;
use chrono::{DateTime, Utc};
use postcrew_core::{Document, Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of the temp files `write_atomic` promotes into place.
const TEMP_PREFIX: &str = ".tmp";

#[derive(Clone, Debug)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of<D: Document>(&self) -> PathBuf {
        self.dir.join(format!("{}.json", D::NAME))
    }

    fn lock_path_of<D: Document>(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", D::NAME))
    }

    /// Read a document. Missing → `D::default()`. Present but unreadable or
    /// unparsable → `DocumentUnavailable`.
    pub fn load<D: Document>(&self) -> Result<D> {
        let path = self.path_of::<D>();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found, using empty document", path.display());
                return Ok(D::default());
            }
            Err(e) => return Err(Error::document_unavailable(D::NAME, e.to_string())),
        };
        serde_json::from_str(&data).map_err(|e| Error::document_unavailable(D::NAME, e.to_string()))
    }

    /// Read for reporting only: an unavailable document is logged and
    /// replaced by the empty default. Nothing on disk is touched.
    pub fn load_or_default<D: Document>(&self) -> D {
        match self.load::<D>() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("{}: {} — using empty document", D::NAME, e);
                D::default()
            }
        }
    }

    /// Write the whole document. Last write wins against concurrent writers;
    /// use `update` when the write depends on what was read.
    pub fn save<D: Document>(&self, doc: &mut D) -> Result<()> {
        doc.touch(Utc::now());
        let bytes = serde_json::to_vec_pretty(doc)?;
        self.write_atomic(&self.path_of::<D>(), &bytes)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Locked read-modify-write. When `f` fails nothing is written and its
    /// error is returned unchanged.
    pub fn update<D: Document, T>(&self, f: impl FnOnce(&mut D) -> Result<T>) -> Result<T> {
        let _lock = DocumentLock::acquire(&self.lock_path_of::<D>())?;
        let mut doc = self.load::<D>()?;
        let out = f(&mut doc)?;
        self.save(&mut doc)?;
        Ok(out)
    }

    /// `update` for documents whose loss is recoverable: a corrupt file is
    /// moved aside and the mutation starts from the empty default.
    pub fn update_or_recover<D: Document, T>(
        &self,
        f: impl FnOnce(&mut D) -> Result<T>,
    ) -> Result<T> {
        let _lock = DocumentLock::acquire(&self.lock_path_of::<D>())?;
        let mut doc = match self.load::<D>() {
            Ok(doc) => doc,
            Err(e) if e.is_document_unavailable() => {
                let moved = self.quarantine::<D>()?;
                warn!(
                    "{}: {} — moved to {}, starting from empty document",
                    D::NAME,
                    e,
                    moved.display()
                );
                D::default()
            }
            Err(e) => return Err(e),
        };
        let out = f(&mut doc)?;
        self.save(&mut doc)?;
        Ok(out)
    }

    /// Remove write temp files last modified before `cutoff`. A writer killed
    /// between create and persist leaves one behind; a live writer's file is
    /// always newer than any sensible cutoff.
    pub fn purge_temp_files_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = meta.modified()?.into();
            if modified >= cutoff {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            debug!("removed {removed} leftover temp files from {}", self.dir.display());
        }
        Ok(removed)
    }

    fn quarantine<D: Document>(&self) -> Result<PathBuf> {
        let ts = Utc::now().format("%Y%m%dT%H%M%S");
        let target = self.dir.join(format!("{}.corrupt-{ts}.json", D::NAME));
        fs::rename(self.path_of::<D>(), &target)?;
        Ok(target)
    }
}
