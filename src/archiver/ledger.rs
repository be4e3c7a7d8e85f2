use crate::error::ArchiverError;
use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Append-only set of URLs that were archived successfully, one per line.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    urls: HashSet<String>,
    needs_newline: bool,
}

fn ledger_error(path: &Path, action: &str, err: std::io::Error) -> anyhow::Error {
    ArchiverError::LedgerIo(format!("failed to {action} {}: {err}", path.display())).into()
}

impl Ledger {
    /// Load the ledger; a missing file is an empty ledger.
    pub fn open(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(ledger_error(path, "read", err)),
        };
        let urls = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            urls,
            needs_newline: !raw.is_empty() && !raw.ends_with('\n'),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.urls.len()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Durably record `url`; returns only after the line is synced to disk.
    pub fn append(&mut self, url: &str) -> Result<()> {
        if self.contains(url) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| ledger_error(parent, "create", err))?;
        }

        let mut line = String::with_capacity(url.len() + 2);
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(url);
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| ledger_error(&self.path, "open", err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| ledger_error(&self.path, "append to", err))?;
        file.sync_all()
            .map_err(|err| ledger_error(&self.path, "sync", err))?;

        self.needs_newline = false;
        self.urls.insert(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Ledger;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_and_created_lazily() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state/processed.log");
        let mut ledger = Ledger::open(&path).expect("open");
        assert_eq!(ledger.entry_count(), 0);
        assert!(!path.exists());

        ledger.append("http://a.example").expect("append");
        assert!(ledger.contains("http://a.example"));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "http://a.example\n"
        );
    }

    #[test]
    fn reload_sees_previous_appends_and_skips_blank_lines() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("processed.log");
        fs::write(&path, "http://a.example\n\n  \nhttp://b.example\n").expect("seed");

        let mut ledger = Ledger::open(&path).expect("open");
        assert_eq!(ledger.entry_count(), 2);
        ledger.append("http://c.example").expect("append");

        let reopened = Ledger::open(&path).expect("reopen");
        assert!(reopened.contains("http://b.example"));
        assert!(reopened.contains("http://c.example"));
        assert!(!reopened.contains("http://c.example/"));
    }

    #[test]
    fn torn_last_line_does_not_fuse_with_next_url() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("processed.log");
        fs::write(&path, "http://a.example\nhttp://b.exa").expect("seed");

        let mut ledger = Ledger::open(&path).expect("open");
        ledger.append("http://c.example").expect("append");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "http://a.example\nhttp://b.exa\nhttp://c.example\n"
        );
    }

    #[test]
    fn appending_a_known_url_writes_nothing() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("processed.log");
        let mut ledger = Ledger::open(&path).expect("open");
        ledger.append("http://a.example").expect("append");
        ledger.append("http://a.example").expect("append again");
        assert_eq!(fs::read_to_string(&path).expect("read").lines().count(), 1);
    }
}
