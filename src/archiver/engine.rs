use crate::archiver::config::ArchiverConfig;
use crate::archiver::ledger::Ledger;
use crate::archiver::profile::locate_snapshot;
use crate::archiver::single_file::{PageArchiver, SingleFileArchiver};
use crate::archiver::tree::{BookmarkEntry, extract_target, read_snapshot};
use crate::archiver::warn::{self, WarnEvent};
use crate::error::ArchiverError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub found: usize,
    pub new: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
    pub archived: Vec<PathBuf>,
    pub pending: Vec<String>,
    pub folder_found: bool,
    pub dry_run: bool,
    pub snapshot_path: PathBuf,
    pub ledger_path: PathBuf,
    pub ledger_entries: usize,
    /// Set when a ledger write failed and the pass stopped early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_failure: Option<String>,
}

/// One reconciliation pass: snapshot → target folder → ledger diff → archive.
///
/// Fatal errors (profile, snapshot, parse, ledger load) surface as `Err`
/// before any archiving. A ledger write that fails mid-pass stops the pass at
/// that URL and is reported through `RunSummary::ledger_failure`, so the
/// caller can still publish what was done.
pub fn run(
    config: &ArchiverConfig,
    archiver: &impl PageArchiver,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let location = locate_snapshot(config.firefox_profile.as_deref(), &config.firefox_home)?;
    log::info!(
        "bookmark snapshot: {} (profile {})",
        location.snapshot_path.display(),
        location.profile_dir.display()
    );

    let extraction = {
        let root = read_snapshot(&location.snapshot_path)?;
        extract_target(&root, &config.bookmark_folder_name)
    };
    if !extraction.folder_found {
        warn::emit(WarnEvent {
            code: "FOLDER_NOT_FOUND",
            stage: "extract",
            url: "",
            path: &location.snapshot_path.display().to_string(),
            retry: "next-run",
            err: &format!("no folder titled {:?}", config.bookmark_folder_name),
        });
    }

    let mut ledger = Ledger::open(&config.processed_urls_log)?;
    log::info!(
        "loaded {} processed urls from {}",
        ledger.entry_count(),
        ledger.path().display()
    );

    let pending: Vec<BookmarkEntry> = extraction
        .entries
        .iter()
        .filter(|entry| !ledger.contains(&entry.url))
        .cloned()
        .collect();

    let mut summary = RunSummary {
        found: extraction.entries.len(),
        new: pending.len(),
        folder_found: extraction.folder_found,
        dry_run: opts.dry_run,
        snapshot_path: location.snapshot_path.clone(),
        ledger_path: ledger.path().to_path_buf(),
        ..RunSummary::default()
    };
    log::info!(
        "folder {:?}: {} bookmarks, {} new",
        config.bookmark_folder_name,
        summary.found,
        summary.new
    );

    if opts.dry_run {
        summary.pending = pending.into_iter().map(|entry| entry.url).collect();
        summary.ledger_entries = ledger.entry_count();
        return Ok(summary);
    }

    if !pending.is_empty() {
        fs::create_dir_all(&config.archive_destination).with_context(|| {
            format!("failed to create {}", config.archive_destination.display())
        })?;
    }

    for entry in &pending {
        log::info!("archiving {} ({})", entry.url, entry.title);
        let result = archiver.archive(&entry.url, &entry.title);
        if result.succeeded {
            if let Err(err) = ledger.append(&entry.url) {
                warn::emit(WarnEvent {
                    code: "LEDGER_APPEND_FAILED",
                    stage: "ledger",
                    url: &entry.url,
                    path: &ledger.path().display().to_string(),
                    retry: "next-run",
                    err: &format!("{err:#}"),
                });
                summary.ledger_failure = Some(match err.downcast_ref::<ArchiverError>() {
                    Some(ArchiverError::LedgerIo(reason)) => reason.clone(),
                    _ => format!("{err:#}"),
                });
                break;
            }
            summary.succeeded += 1;
            if let Some(path) = result.output_path {
                log::info!("saved {}", path.display());
                summary.archived.push(path);
            }
            continue;
        }

        let reason = result
            .error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown failure".to_string());
        warn::emit(WarnEvent {
            code: "ARCHIVE_FAILED",
            stage: "single-file",
            url: &entry.url,
            path: "",
            retry: "next-run",
            err: &reason,
        });
        summary.failed += 1;
        summary.failures.push(FailureRecord {
            url: entry.url.clone(),
            title: entry.title.clone(),
            reason,
        });
    }

    summary.ledger_entries = ledger.entry_count();
    log::info!(
        "archived {}/{} new urls ({} failed)",
        summary.succeeded,
        summary.new,
        summary.failed
    );
    Ok(summary)
}

pub fn run_with_single_file(config: &ArchiverConfig, opts: &RunOptions) -> Result<RunSummary> {
    let archiver = SingleFileArchiver::new(&config.single_file, &config.archive_destination);
    run(config, &archiver, opts)
}
