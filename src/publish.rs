//! Publish preparation: package verified entries for manual upload.
//!
//! Each package is `<outbox>/<id>.json`. A packaged entry moves to `ready`;
//! an entry that cannot be packaged moves to `failed`.

use crate::gate::{resolve_slide_dir, slide_files};
use crate::queue::QueueManager;
use chrono::{DateTime, Utc};
use postcrew_core::{Category, CtaType, Error, QueueEntry, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadPackage {
    pub id: u64,
    pub content_id: String,
    pub category: Category,
    pub cta_type: CtaType,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub slides: Vec<PathBuf>,
    pub packaged_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishReport {
    pub ready: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

#[derive(Clone, Debug)]
pub struct Packager {
    outbox: PathBuf,
    assets_root: PathBuf,
    slide_extensions: Vec<String>,
    min_slides: usize,
}

impl Packager {
    pub fn new(
        outbox: PathBuf,
        assets_root: PathBuf,
        slide_extensions: Vec<String>,
        min_slides: usize,
    ) -> Self {
        Self { outbox, assets_root, slide_extensions, min_slides }
    }

    pub fn package_path(&self, id: u64) -> PathBuf {
        self.outbox.join(format!("{id}.json"))
    }

    pub fn package(&self, entry: &QueueEntry) -> Result<PathBuf> {
        let dir = entry
            .slide_dir
            .as_deref()
            .ok_or_else(|| Error::packaging(entry.id, "no slide_dir"))?;
        let dir = resolve_slide_dir(&self.assets_root, dir);
        let slides = slide_files(&dir, &self.slide_extensions)
            .map_err(|e| Error::packaging(entry.id, format!("{}: {e}", dir.display())))?;
        if slides.is_empty() {
            return Err(Error::packaging(entry.id, format!("no slides in {}", dir.display())));
        }
        // the bundle may have changed since the gate verified it
        if slides.len() < self.min_slides {
            return Err(Error::packaging(
                entry.id,
                format!("only {} slides in {} (min {})", slides.len(), dir.display(), self.min_slides),
            ));
        }

        let package = UploadPackage {
            id: entry.id,
            content_id: entry.content_id.clone(),
            category: entry.category,
            cta_type: entry.cta_type,
            caption: entry.caption.clone(),
            hashtags: entry.hashtags.clone(),
            slides,
            packaged_at: Utc::now(),
        };

        let write = || -> std::io::Result<PathBuf> {
            std::fs::create_dir_all(&self.outbox)?;
            let path = self.package_path(entry.id);
            let bytes = serde_json::to_vec_pretty(&package)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&self.outbox)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(path)
        };
        write().map_err(|e| Error::packaging(entry.id, e.to_string()))
    }

    /// Package up to `limit` eligible entries, oldest first.
    pub fn publish(&self, queue: &QueueManager, limit: usize) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        for entry in queue.eligible_for_publish()?.into_iter().take(limit) {
            match self.package(&entry) {
                Ok(path) => {
                    queue.transition(entry.id, postcrew_core::QueueStatus::Ready)?;
                    info!(id = entry.id, path = %path.display(), "entry packaged");
                    report.ready.push(entry.id);
                }
                Err(e) => {
                    warn!(id = entry.id, "{e}");
                    let reason = e.to_string();
                    queue.fail(entry.id, &reason)?;
                    report.failed.push((entry.id, reason));
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postcrew_core::{NewEntry, PostingQueue, QueueStatus};
    use postcrew_store::DocumentStore;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, QueueManager, DocumentStore, Packager) {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path().join("data")).unwrap();
        let packager = Packager::new(
            tmp.path().join("data/outbox"),
            tmp.path().to_path_buf(),
            vec!["png".into()],
            4,
        );
        (tmp, QueueManager::new(store.clone()), store, packager)
    }

    fn verified(store: &DocumentStore, slide_dir: &str) -> u64 {
        store
            .update(|q: &mut PostingQueue| {
                let id = q.append(
                    NewEntry {
                        content_id: format!("run-{slide_dir}"),
                        category: Category::Service,
                        cta_type: CtaType::Hard,
                        caption: "our agency finds you a better ward".into(),
                        hashtags: vec!["#nurse".into()],
                        slide_dir: Some(slide_dir.into()),
                    },
                    Utc::now(),
                );
                q.get_mut(id).unwrap().verified = true;
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn packages_and_marks_ready() {
        let (tmp, qm, store, packager) = setup();
        let slides = tmp.path().join("s1");
        fs::create_dir_all(&slides).unwrap();
        for name in ["02.png", "04.png", "01.png", "03.png", "cover.psd"] {
            fs::write(slides.join(name), b"x").unwrap();
        }
        let id = verified(&store, "s1");

        let report = packager.publish(&qm, 5).unwrap();
        assert_eq!(report.ready, vec![id]);
        let q = qm.snapshot().unwrap();
        assert_eq!(q.get(id).unwrap().status, QueueStatus::Ready);

        let pkg: UploadPackage =
            serde_json::from_slice(&fs::read(packager.package_path(id)).unwrap()).unwrap();
        let names: Vec<String> = pkg
            .slides
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01.png", "02.png", "03.png", "04.png"]);
    }

    #[test]
    fn packaging_error_marks_failed() {
        let (_tmp, qm, store, packager) = setup();
        let id = verified(&store, "missing");
        let report = packager.publish(&qm, 5).unwrap();
        assert_eq!(report.failed.len(), 1);
        let e = qm.snapshot().unwrap().get(id).unwrap().clone();
        assert_eq!(e.status, QueueStatus::Failed);
        assert!(e.failure_reason.unwrap().contains("packaging failed"));
        assert!(e.failed_at.is_some());
    }

    #[test]
    fn bundle_that_lost_slides_after_review_fails() {
        let (tmp, qm, store, packager) = setup();
        let slides = tmp.path().join("thin");
        fs::create_dir_all(&slides).unwrap();
        fs::write(slides.join("01.png"), b"x").unwrap();
        fs::write(slides.join("02.png"), b"x").unwrap();
        let id = verified(&store, "thin");

        let report = packager.publish(&qm, 5).unwrap();
        assert!(report.ready.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(!packager.package_path(id).exists());
        let e = qm.snapshot().unwrap().get(id).unwrap().clone();
        assert_eq!(e.status, QueueStatus::Failed);
        assert!(e.failure_reason.unwrap().contains("only 2 slides"));
    }

    #[test]
    fn limit_caps_the_batch() {
        let (tmp, qm, store, packager) = setup();
        fs::create_dir_all(tmp.path().join("s")).unwrap();
        for i in 1..=4 {
            fs::write(tmp.path().join(format!("s/{i}.png")), b"x").unwrap();
        }
        let first = verified(&store, "s");
        verified(&store, "s");
        assert_eq!(packager.publish(&qm, 1).unwrap().ready, vec![first]);
        assert_eq!(qm.eligible_for_publish().unwrap().len(), 1);
    }
}
