use crate::archiver::config::StatusConfig;
use crate::archiver::engine::RunSummary;
use crate::archiver::paths::APP_ID;
use crate::archiver::util::now_epoch_secs;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent<'a> {
    pub source: &'static str,
    pub at_epoch_secs: u64,
    pub outcome: &'static str,
    pub summary: &'a RunSummary,
}

impl<'a> StatusEvent<'a> {
    pub fn from_summary(summary: &'a RunSummary) -> Result<Self> {
        let outcome = if summary.dry_run {
            "dry-run"
        } else if summary.ledger_failure.is_some() {
            "aborted"
        } else if summary.failed > 0 {
            "partial"
        } else {
            "ok"
        };
        Ok(Self {
            source: APP_ID,
            at_epoch_secs: now_epoch_secs()?,
            outcome,
            summary,
        })
    }
}

/// Receives the end-of-run summary. Called only after the last ledger append
/// of the pass, including one that failed.
pub trait StatusPublisher {
    fn name(&self) -> String;
    fn publish(&self, event: &StatusEvent<'_>) -> Result<()>;
}

pub struct AuditLogPublisher {
    pub path: PathBuf,
}

impl StatusPublisher for AuditLogPublisher {
    fn name(&self) -> String {
        format!("audit-log:{}", self.path.display())
    }

    fn publish(&self, event: &StatusEvent<'_>) -> Result<()> {
        append_event(&self.path, event)
    }
}

pub fn append_event(path: &Path, event: &StatusEvent<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let line = format!("{}\n", serde_json::to_string(event)?);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

pub struct WebhookPublisher {
    pub url: String,
    pub timeout_secs: u64,
}

impl StatusPublisher for WebhookPublisher {
    fn name(&self) -> String {
        format!("webhook:{}", self.url)
    }

    fn publish(&self, event: &StatusEvent<'_>) -> Result<()> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        let response = client.post(&self.url).json(event).send()?;
        if !response.status().is_success() {
            anyhow::bail!("webhook answered with status {}", response.status());
        }
        Ok(())
    }
}

pub fn publishers_from_config(cfg: &StatusConfig) -> Vec<Box<dyn StatusPublisher>> {
    let mut out: Vec<Box<dyn StatusPublisher>> = Vec::new();
    if let Some(path) = &cfg.audit_log {
        out.push(Box::new(AuditLogPublisher { path: path.clone() }));
    }
    if let Some(url) = &cfg.webhook_url {
        out.push(Box::new(WebhookPublisher {
            url: url.clone(),
            timeout_secs: cfg.webhook_timeout_secs,
        }));
    }
    out
}
