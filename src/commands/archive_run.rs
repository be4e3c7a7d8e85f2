use anyhow::Result;
use std::path::PathBuf;

use crate::archiver::config::load_config;
use crate::archiver::engine::{self, RunOptions, RunSummary};
use crate::archiver::paths::resolve_paths;
use crate::archiver::status::{StatusEvent, publishers_from_config};
use crate::archiver::warn::{self, WarnEvent};
use crate::commands::CommandReport;
use crate::error::ArchiverError;

#[derive(Debug, Clone, Default)]
pub struct ArchiveRunOptions {
    pub config_path: Option<PathBuf>,
    pub dry_run: bool,
}

fn summarize(report: &mut CommandReport, summary: &RunSummary) {
    report.detail(format!("snapshot={}", summary.snapshot_path.display()));
    report.detail(format!("folder_found={}", summary.folder_found));
    report.detail(format!("found={}", summary.found));
    report.detail(format!("new={}", summary.new));
    report.detail(format!("succeeded={}", summary.succeeded));
    report.detail(format!("failed={}", summary.failed));
    report.detail(format!(
        "ledger={} entries={}",
        summary.ledger_path.display(),
        summary.ledger_entries
    ));
    for path in &summary.archived {
        report.detail(format!("archived={}", path.display()));
    }
    for url in &summary.pending {
        report.detail(format!("pending={url}"));
    }
    for failure in &summary.failures {
        report.issue(format!("failed url={} reason={}", failure.url, failure.reason));
    }
}

pub fn run(opts: &ArchiveRunOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let config = load_config(opts.config_path.as_deref(), &paths)?;
    let mut report = CommandReport::new(if opts.dry_run {
        "archive-dry-run"
    } else {
        "archive"
    });

    match &config.loaded_from {
        Some(path) => report.detail(format!("config={}", path.display())),
        None => report.detail("config=defaults"),
    }
    report.detail(format!("folder={}", config.bookmark_folder_name));
    report.detail(format!(
        "destination={}",
        config.archive_destination.display()
    ));

    let summary = engine::run_with_single_file(
        &config,
        &RunOptions {
            dry_run: opts.dry_run,
        },
    )?;
    summarize(&mut report, &summary);

    if summary.dry_run {
        return Ok(report);
    }

    let event = StatusEvent::from_summary(&summary)?;
    for publisher in publishers_from_config(&config.status) {
        match publisher.publish(&event) {
            Ok(()) => report.detail(format!("status.published={}", publisher.name())),
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "STATUS_PUBLISH_FAILED",
                    stage: "status",
                    url: "",
                    path: &publisher.name(),
                    retry: "next-run",
                    err: &format!("{err:#}"),
                });
                report.detail(format!("status.failed={}", publisher.name()));
            }
        }
    }

    if let Some(reason) = summary.ledger_failure {
        return Err(ArchiverError::LedgerIo(reason).into());
    }
    Ok(report)
}
