//! Postcrew configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use chrono::Duration;
use postcrew_core::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A failed agent or entry is retried after one missed daily cycle. This
/// leaves a human a full day to notice a real failure first.
pub const HEAL_AFTER_HOURS: i64 = 24;
/// Two missed daily cycles.
pub const STALE_AFTER_HOURS: i64 = 48;
pub const RETENTION_DAYS: i64 = 30;
/// Write temp files older than this are left over from a crashed writer.
pub const TEMP_FILE_MAX_AGE_HOURS: i64 = 1;
/// Below this many pending entries the monitor asks for emergency generation.
pub const MIN_PENDING_ENTRIES: usize = 3;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostcrewConfig {
    /// Where documents, events and the outbox live.
    pub paths: PathsConfig,
    /// Self-healing thresholds.
    pub monitor: MonitorConfig,
    /// Quality gate limits.
    pub gate: GateConfig,
    /// Generation planning (content mix and CTA ratio).
    pub plan: PlanConfig,
    /// Notification channel.
    pub notify: NotifyConfig,
    /// External content generator.
    pub generator: GeneratorConfig,
    /// Publish preparation.
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding queue.json, agents.json, context.json.
    pub data_dir: PathBuf,
    /// Base for relative `slide_dir` references.
    pub assets_root: PathBuf,
    /// CSV of candidate source material, used for the content mix.
    pub stock_catalog: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub heal_after_hours: i64,
    pub stale_after_hours: i64,
    pub retention_days: i64,
    pub temp_file_max_age_hours: i64,
    pub min_pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Captions shorter than this (in characters) fail.
    pub min_caption_chars: usize,
    /// Captions longer than this are cut down to `truncate_caption_to`.
    pub max_caption_chars: usize,
    pub truncate_caption_to: usize,
    pub max_hashtags: usize,
    pub min_slides: usize,
    /// File extensions that count as rendered slides.
    pub slide_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Entries generated per regular creator run.
    pub batch_size: usize,
    /// Entries generated for an emergency_generate task.
    pub emergency_batch_size: usize,
    /// Share of soft CTAs per batch (8:2 policy).
    pub soft_fraction: f64,
    /// Target share of each category in the content mix.
    pub targets: TargetMix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetMix {
    pub aruaru: f64,
    pub career: f64,
    pub salary: f64,
    pub service: f64,
    pub trend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Slack incoming-webhook URL. Unset means only the fallback file is used.
    pub slack_webhook: Option<String>,
    /// Secondary delivery path: messages are appended here when Slack fails.
    pub fallback_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Program invoked once per plan slot.
    pub command: String,
    /// Extra arguments placed before `--category` / `--cta`.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Maximum entries packaged per publisher run.
    pub per_run: usize,
}

// ============================================================
// Defaults
// ============================================================

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            assets_root: PathBuf::from("."),
            stock_catalog: PathBuf::from("data/stock.csv"),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heal_after_hours: HEAL_AFTER_HOURS,
            stale_after_hours: STALE_AFTER_HOURS,
            retention_days: RETENTION_DAYS,
            temp_file_max_age_hours: TEMP_FILE_MAX_AGE_HOURS,
            min_pending: MIN_PENDING_ENTRIES,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_caption_chars: 10,
            max_caption_chars: 250,
            truncate_caption_to: 200,
            max_hashtags: 5,
            min_slides: 4,
            slide_extensions: vec!["png".into(), "jpg".into(), "jpeg".into(), "webp".into()],
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            batch_size: 7,
            emergency_batch_size: 3,
            soft_fraction: 0.8,
            targets: TargetMix::default(),
        }
    }
}

impl Default for TargetMix {
    fn default() -> Self {
        Self { aruaru: 0.30, career: 0.25, salary: 0.20, service: 0.10, trend: 0.15 }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { slack_webhook: None, fallback_file: None, timeout_secs: 10 }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { command: "postcrew-generate".into(), args: Vec::new(), timeout_secs: 600 }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { per_run: 3 }
    }
}

// ============================================================
// Loading
// ============================================================

impl PostcrewConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Apply `POSTCREW_DATA_DIR` and `SLACK_WEBHOOK_URL` on top of the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("POSTCREW_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.notify.slack_webhook = Some(url);
            }
        }
        self
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn fallback_file(&self) -> PathBuf {
        self.notify
            .fallback_file
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("notifications.log"))
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.paths.data_dir.join("outbox")
    }

    pub fn events_path(&self) -> PathBuf {
        self.paths.data_dir.join("events.jsonl")
    }
}

impl MonitorConfig {
    pub fn heal_after(&self) -> Duration {
        Duration::hours(self.heal_after_hours)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::hours(self.stale_after_hours)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days)
    }

    pub fn temp_file_max_age(&self) -> Duration {
        Duration::hours(self.temp_file_max_age_hours)
    }
}

impl TargetMix {
    /// Ratios in category declaration order.
    pub fn ratios(&self) -> Vec<(Category, f64)> {
        Category::ALL
            .into_iter()
            .map(|c| {
                let r = match c {
                    Category::Aruaru => self.aruaru,
                    Category::Career => self.career,
                    Category::Salary => self.salary,
                    Category::Service => self.service,
                    Category::Trend => self.trend,
                };
                (c, r)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_named_thresholds() {
        let c = PostcrewConfig::default();
        assert_eq!(c.monitor.heal_after(), Duration::hours(24));
        assert_eq!(c.monitor.stale_after(), Duration::hours(48));
        assert_eq!(c.monitor.retention(), Duration::days(30));
        assert_eq!(c.monitor.temp_file_max_age(), Duration::hours(1));
        assert_eq!(c.monitor.min_pending, 3);
        assert_eq!(c.gate.max_hashtags, 5);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let c: PostcrewConfig = toml::from_str(
            r#"
            [gate]
            min_slides = 6

            [plan.targets]
            trend = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(c.gate.min_slides, 6);
        assert_eq!(c.gate.max_caption_chars, 250);
        assert_eq!(c.plan.targets.trend, 0.5);
        assert_eq!(c.plan.targets.aruaru, 0.30);
        assert_eq!(c.plan.batch_size, 7);
    }

    #[test]
    fn default_config_survives_toml_roundtrip() {
        let text = PostcrewConfig::default().to_toml();
        let back: PostcrewConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.plan.soft_fraction, 0.8);
        assert_eq!(back.paths.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let c = PostcrewConfig::load(&tmp.path().join("absent.toml"));
        assert_eq!(c.publish.per_run, 3);
    }

    #[test]
    fn ratios_follow_declaration_order() {
        let r = TargetMix::default().ratios();
        let cats: Vec<Category> = r.iter().map(|(c, _)| *c).collect();
        assert_eq!(cats, Category::ALL.to_vec());
        let total: f64 = r.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn derived_paths_live_under_data_dir() {
        let c = PostcrewConfig::default();
        assert_eq!(c.fallback_file(), PathBuf::from("data/notifications.log"));
        assert_eq!(c.outbox_dir(), PathBuf::from("data/outbox"));
        assert_eq!(c.events_path(), PathBuf::from("data/events.jsonl"));
    }
}
