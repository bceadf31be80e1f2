//! Notification channel: Slack webhook with a local file fallback.
//!
//! Delivery is best-effort. The primary channel is tried twice, then the
//! message goes to the fallback. Nothing here ever fails an invocation.

use crate::config::NotifyConfig;
use chrono::Utc;
use postcrew_core::{Error, Result};
use reqwest::Client;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &str) -> Result<()>;
}

/// Slack incoming webhook.
pub struct SlackWebhook {
    client: Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, url: url.into() }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, message: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .map_err(|e| Error::delivery("slack", e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::delivery("slack", format!("{status}: {body}")));
        }
        debug!("slack notification delivered");
        Ok(())
    }
}

/// Appends timestamped messages to a local file.
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Notifier for FileNotifier {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, message: &str) -> Result<()> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            writeln!(f, "--- {}\n{}", Utc::now().to_rfc3339(), message)
        };
        write().map_err(|e| Error::delivery("file", e.to_string()))
    }
}

/// Which channel ended up carrying a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivered {
    Primary,
    Fallback,
}

pub struct FallbackNotifier {
    primary: Option<Box<dyn Notifier>>,
    fallback: Box<dyn Notifier>,
}

impl FallbackNotifier {
    pub fn new(primary: Option<Box<dyn Notifier>>, fallback: Box<dyn Notifier>) -> Self {
        Self { primary, fallback }
    }

    pub fn from_config(config: &NotifyConfig, fallback_file: PathBuf) -> Self {
        let primary = config.slack_webhook.as_ref().map(|url| {
            Box::new(SlackWebhook::new(url, Duration::from_secs(config.timeout_secs)))
                as Box<dyn Notifier>
        });
        Self::new(primary, Box::new(FileNotifier::new(fallback_file)))
    }

    /// Primary twice, then fallback. Errors only if the fallback fails too.
    pub async fn deliver(&self, message: &str) -> Result<Delivered> {
        if let Some(primary) = &self.primary {
            for attempt in 1..=2 {
                match primary.send(message).await {
                    Ok(()) => return Ok(Delivered::Primary),
                    Err(e) => warn!("{} delivery attempt {attempt} failed: {e}", primary.name()),
                }
            }
        }
        self.fallback.send(message).await?;
        Ok(Delivered::Fallback)
    }

    /// `deliver`, logging instead of returning the error.
    pub async fn notify(&self, message: &str) {
        if let Err(e) = self.deliver(message).await {
            warn!("notification dropped: {e}");
        }
    }
}
