use crate::archiver::config::SingleFileConfig;
use crate::archiver::util::{CommandOutcome, run_command_with_timeout, tail_one_line};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const UNTITLED: &str = "untitled";
const MAX_TITLE_CHARS: usize = 100;
// Filesystems cap a name at 255 bytes; leave room for the stamp and extension.
const MAX_TITLE_BYTES: usize = 200;
const STDERR_TAIL_CHARS: usize = 300;

/// Why one URL could not be archived. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ArchiveFailure {
    SpawnFailed { reason: String },
    Timeout { secs: u64 },
    NonzeroExit { code: Option<i32>, stderr: String },
    MissingOutput,
    EmptyOutput,
}

impl fmt::Display for ArchiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { reason } => write!(f, "spawn-failed: {reason}"),
            Self::Timeout { secs } => write!(f, "timeout: no result after {secs}s"),
            Self::NonzeroExit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "nonzero-exit: status {code}")?,
                    None => write!(f, "nonzero-exit: killed by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::MissingOutput => write!(f, "empty-output: tool wrote no file"),
            Self::EmptyOutput => write!(f, "empty-output: tool wrote a zero-byte file"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResult {
    pub url: String,
    pub title: String,
    pub output_path: Option<PathBuf>,
    pub succeeded: bool,
    pub error: Option<ArchiveFailure>,
}

impl ArchiveResult {
    pub fn success(url: &str, title: &str, output_path: PathBuf) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            output_path: Some(output_path),
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(url: &str, title: &str, error: ArchiveFailure) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            output_path: None,
            succeeded: false,
            error: Some(error),
        }
    }
}

/// Anything that can turn a URL into a saved page.
pub trait PageArchiver {
    fn archive(&self, url: &str, title: &str) -> ArchiveResult;
}

/// Keep alphanumerics, spaces, `-` and `_`; everything else becomes `-`.
/// The result is capped in both characters and UTF-8 bytes.
pub fn sanitize_title(title: &str) -> String {
    if title.trim().is_empty() {
        return UNTITLED.to_string();
    }
    let mut out = String::new();
    for c in title.chars().take(MAX_TITLE_CHARS) {
        let c = if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
            c
        } else {
            '-'
        };
        if out.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        out.push(c);
    }
    out
}

pub fn archive_filename(stamp: &str, title: &str, extension: &str) -> String {
    format!("{stamp}_{}.{extension}", sanitize_title(title))
}

fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }
        anyhow::bail!("archiving tool not found at {}", as_path.display());
    }
    which::which(program)
        .with_context(|| format!("archiving tool `{program}` not found on PATH"))
}

/// Runs the SingleFile CLI (or any tool with the same `<url> <output>` contract).
#[derive(Debug, Clone)]
pub struct SingleFileArchiver {
    program: String,
    args: Vec<String>,
    destination: PathBuf,
    extension: String,
    timeout: Duration,
}

impl SingleFileArchiver {
    pub fn new(cfg: &SingleFileConfig, destination: &Path) -> Self {
        let mut parts = cfg.command.iter().filter(|p| !p.trim().is_empty()).cloned();
        let program = parts.next().unwrap_or_default();
        let mut args: Vec<String> = parts.collect();
        args.extend(cfg.extra_args.iter().cloned());
        Self {
            program,
            args,
            destination: destination.to_path_buf(),
            extension: cfg.extension.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub fn output_path_for(&self, stamp: &str, title: &str) -> PathBuf {
        self.destination
            .join(archive_filename(stamp, title, &self.extension))
    }

    fn verify_output(path: &Path) -> Option<ArchiveFailure> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => None,
            Ok(meta) if meta.is_file() => {
                let _ = fs::remove_file(path);
                Some(ArchiveFailure::EmptyOutput)
            }
            Ok(_) => Some(ArchiveFailure::MissingOutput),
            Err(err) if err.kind() == ErrorKind::NotFound => Some(ArchiveFailure::MissingOutput),
            Err(err) => Some(ArchiveFailure::SpawnFailed {
                reason: format!("cannot stat {}: {err}", path.display()),
            }),
        }
    }
}

impl PageArchiver for SingleFileArchiver {
    fn archive(&self, url: &str, title: &str) -> ArchiveResult {
        let output_path = self.output_path_for(&timestamp_now(), title);

        let bin = match resolve_program(&self.program) {
            Ok(bin) => bin,
            Err(err) => {
                return ArchiveResult::failure(
                    url,
                    title,
                    ArchiveFailure::SpawnFailed {
                        reason: format!("{err:#}"),
                    },
                );
            }
        };

        log::debug!(
            "running {} {} {} {}",
            bin.display(),
            self.args.join(" "),
            url,
            output_path.display()
        );
        let mut cmd = Command::new(&bin);
        cmd.args(&self.args).arg(url).arg(&output_path);

        let outcome = match run_command_with_timeout(&mut cmd, self.timeout) {
            Ok(outcome) => outcome,
            Err(err) => {
                return ArchiveResult::failure(
                    url,
                    title,
                    ArchiveFailure::SpawnFailed {
                        reason: format!("failed to run `{}`: {err:#}", bin.display()),
                    },
                );
            }
        };

        match outcome {
            CommandOutcome::TimedOut => ArchiveResult::failure(
                url,
                title,
                ArchiveFailure::Timeout {
                    secs: self.timeout.as_secs(),
                },
            ),
            CommandOutcome::Exited {
                status,
                stdout,
                stderr,
            } if !status.success() => {
                let detail = if stderr.trim().is_empty() {
                    stdout
                } else {
                    stderr
                };
                ArchiveResult::failure(
                    url,
                    title,
                    ArchiveFailure::NonzeroExit {
                        code: status.code(),
                        stderr: tail_one_line(&detail, STDERR_TAIL_CHARS),
                    },
                )
            }
            CommandOutcome::Exited { .. } => match Self::verify_output(&output_path) {
                None => ArchiveResult::success(url, title, output_path),
                Some(failure) => ArchiveResult::failure(url, title, failure),
            },
        }
    }
}
