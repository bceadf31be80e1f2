//! Content generation collaborator.
//!
//! The generator itself lives outside this crate. It is run once per plan
//! slot as `<command> [args..] --category <c> --cta <t>` and must print one
//! JSON object on stdout.

use crate::config::GeneratorConfig;
use crate::plan::PlanSlot;
use postcrew_core::{Error, NewEntry, Result};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[async_trait::async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, slot: PlanSlot) -> Result<NewEntry>;
}

/// What the generator prints.
#[derive(Debug, Deserialize)]
pub struct GeneratedContent {
    pub content_id: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub slide_dir: Option<String>,
}

impl GeneratedContent {
    pub fn into_entry(self, slot: PlanSlot) -> NewEntry {
        NewEntry {
            content_id: self.content_id,
            category: slot.category,
            cta_type: slot.cta_type,
            caption: self.caption,
            hashtags: self.hashtags,
            slide_dir: self.slide_dir,
        }
    }
}

pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait::async_trait]
impl ContentGenerator for CommandGenerator {
    async fn generate(&self, slot: PlanSlot) -> Result<NewEntry> {
        debug!(program = %self.program, category = %slot.category, cta = %slot.cta_type, "running generator");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--category")
            .arg(slot.category.as_str())
            .arg("--cta")
            .arg(slot.cta_type.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::generation(format!("{} timed out after {:?}", self.program, self.timeout)))?
            .map_err(|e| Error::generation(format!("{} could not start: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::generation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_output(&output.stdout).map(|c| c.into_entry(slot))
    }
}

/// The last non-empty stdout line must be the JSON object; generators are
/// allowed to print progress before it.
pub fn parse_output(stdout: &[u8]) -> Result<GeneratedContent> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::generation("generator printed nothing"))?;
    serde_json::from_str(line.trim())
        .map_err(|e| Error::generation(format!("unparsable generator output: {e}")))
}
