//! Quality gate: validate and auto-repair pending entries before publish.

use crate::config::GateConfig;
use postcrew_core::{CtaType, Error, PostingQueue, QueueEntry, QueueStatus, Result};
use postcrew_store::DocumentStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateReport {
    pub checked: usize,
    pub verified: Vec<u64>,
    /// Entries with at least one hard failure, with every reason found.
    pub rejected: Vec<(u64, Vec<String>)>,
    /// Auto-fixes applied, one line per fix.
    pub fixes: Vec<(u64, String)>,
}

impl GateReport {
    pub fn failures(&self) -> Vec<Error> {
        self.rejected
            .iter()
            .map(|(id, reasons)| Error::ValidationFailure { id: *id, reasons: reasons.clone() })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct QualityGate {
    config: GateConfig,
    assets_root: PathBuf,
}

impl QualityGate {
    pub fn new(config: GateConfig, assets_root: impl Into<PathBuf>) -> Self {
        Self { config, assets_root: assets_root.into() }
    }

    /// Run over the stored queue in one locked update.
    pub fn review(&self, store: &DocumentStore) -> Result<GateReport> {
        let report = store.update_or_recover(|q: &mut PostingQueue| Ok(self.run(q)))?;
        info!(
            checked = report.checked,
            verified = report.verified.len(),
            rejected = report.rejected.len(),
            "quality gate finished"
        );
        Ok(report)
    }

    /// Check every pending, unverified entry. Running twice changes nothing
    /// the first run did not.
    pub fn run(&self, queue: &mut PostingQueue) -> GateReport {
        let mut report = GateReport::default();
        for entry in queue
            .entries
            .iter_mut()
            .filter(|e| e.status == QueueStatus::Pending && !e.verified)
        {
            report.checked += 1;
            let (reasons, fixes) = self.check(entry);
            report.fixes.extend(fixes.into_iter().map(|f| (entry.id, f)));
            if reasons.is_empty() {
                entry.verified = true;
                entry.validation_errors.clear();
                report.verified.push(entry.id);
            } else {
                warn!(id = entry.id, reasons = %reasons.join("; "), "entry rejected");
                entry.validation_errors = reasons.clone();
                report.rejected.push((entry.id, reasons));
            }
        }
        report
    }

    fn check(&self, entry: &mut QueueEntry) -> (Vec<String>, Vec<String>) {
        let mut reasons = Vec::new();
        let mut fixes = Vec::new();
        let cfg = &self.config;

        let len = entry.caption.chars().count();
        if len < cfg.min_caption_chars {
            reasons.push(format!(
                "caption too short: {len} chars (min {})",
                cfg.min_caption_chars
            ));
        } else if len > cfg.max_caption_chars {
            entry.caption = entry.caption.chars().take(cfg.truncate_caption_to).collect();
            fixes.push(format!("caption truncated from {len} to {} chars", cfg.truncate_caption_to));
        }

        if entry.hashtags.len() > cfg.max_hashtags {
            let dropped = entry.hashtags.len() - cfg.max_hashtags;
            entry.hashtags.truncate(cfg.max_hashtags);
            fixes.push(format!("dropped {dropped} hashtags over the limit of {}", cfg.max_hashtags));
        }

        match self.count_slides(entry.slide_dir.as_deref()) {
            Ok(n) if n >= cfg.min_slides => debug!(id = entry.id, slides = n, "slides ok"),
            Ok(n) => reasons.push(format!("only {n} slides (min {})", cfg.min_slides)),
            Err(reason) => reasons.push(reason),
        }

        if !entry.cta_type.is_valid() {
            entry.cta_type = CtaType::Soft;
            fixes.push("unrecognized cta_type coerced to soft".into());
        }

        (reasons, fixes)
    }

    fn count_slides(&self, slide_dir: Option<&str>) -> std::result::Result<usize, String> {
        let Some(dir) = slide_dir.filter(|d| !d.trim().is_empty()) else {
            return Err("no slide_dir".into());
        };
        let path = resolve_slide_dir(&self.assets_root, dir);
        slide_files(&path, &self.config.slide_extensions)
            .map(|files| files.len())
            .map_err(|e| format!("slide_dir {} unreadable: {e}", path.display()))
    }
}

/// Relative slide dirs are taken from `assets_root`.
pub fn resolve_slide_dir(assets_root: &Path, slide_dir: &str) -> PathBuf {
    let p = Path::new(slide_dir);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        assets_root.join(p)
    }
}

pub fn is_slide(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// Rendered slide files in `dir`, sorted by path.
pub fn slide_files(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_slide(p, extensions))
        .collect();
    files.sort();
    Ok(files)
}
