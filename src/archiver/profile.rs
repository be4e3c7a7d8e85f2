use crate::error::ArchiverError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const PROFILES_INDEX: &str = "profiles.ini";
const BACKUPS_DIR: &str = "bookmarkbackups";

#[derive(Debug, Clone)]
pub struct SnapshotLocation {
    pub profile_dir: PathBuf,
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_ini(raw: &str) -> std::result::Result<Vec<IniSection>, String> {
    let mut sections: Vec<IniSection> = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            sections.push(IniSection {
                name: name.trim().to_string(),
                entries: Vec::new(),
            });
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(format!("line {} is not `key=value`", idx + 1));
        };
        let Some(section) = sections.last_mut() else {
            return Err(format!("line {} precedes any [section]", idx + 1));
        };
        section
            .entries
            .push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(sections)
}

fn resolve_profile_path(firefox_home: &Path, path: &str, is_relative: bool) -> PathBuf {
    if is_relative {
        firefox_home.join(path)
    } else {
        PathBuf::from(path)
    }
}

/// Pick the default profile from `profiles.ini`.
///
/// A `[Profile*]` section with `Default=1` wins; failing that, an `[Install*]`
/// section's `Default=<relative path>` is accepted.
pub fn default_profile_dir(firefox_home: &Path) -> Result<PathBuf> {
    let index = firefox_home.join(PROFILES_INDEX);
    let raw = fs::read_to_string(&index).map_err(|err| {
        ArchiverError::ProfileNotFound(format!("cannot read {}: {err}", index.display()))
    })?;
    let sections = parse_ini(&raw).map_err(|reason| {
        ArchiverError::ProfileNotFound(format!("malformed {}: {reason}", index.display()))
    })?;

    for section in sections.iter().filter(|s| s.name.starts_with("Profile")) {
        if section.get("Default") != Some("1") {
            continue;
        }
        let Some(path) = section.get("Path").filter(|p| !p.is_empty()) else {
            return Err(ArchiverError::ProfileNotFound(format!(
                "default profile [{}] has no Path in {}",
                section.name,
                index.display()
            ))
            .into());
        };
        let is_relative = section.get("IsRelative").unwrap_or("1") == "1";
        return Ok(resolve_profile_path(firefox_home, path, is_relative));
    }

    if let Some(path) = sections
        .iter()
        .filter(|s| s.name.starts_with("Install"))
        .find_map(|s| s.get("Default").filter(|p| !p.is_empty()))
    {
        return Ok(resolve_profile_path(firefox_home, path, true));
    }

    Err(ArchiverError::ProfileNotFound(format!(
        "no default profile declared in {}",
        index.display()
    ))
    .into())
}

fn is_snapshot_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".json") || n.ends_with(".jsonlz4"))
}

/// Most recently modified snapshot in `dir`; ties go to the greater file name.
pub fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>> {
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_snapshot_name(&path) {
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(UNIX_EPOCH);
        match &latest {
            Some((best, best_path)) if (modified, &path) <= (*best, best_path) => {}
            _ => latest = Some((modified, path)),
        }
    }

    Ok(latest.map(|(_, p)| p))
}

fn snapshot_in_profile(profile_dir: &Path) -> Result<PathBuf> {
    let backups = profile_dir.join(BACKUPS_DIR);
    if !backups.is_dir() {
        return Err(ArchiverError::NoSnapshot(format!(
            "backup directory missing: {}",
            backups.display()
        ))
        .into());
    }
    latest_snapshot(&backups)?.ok_or_else(|| {
        ArchiverError::NoSnapshot(format!("no *.json or *.jsonlz4 in {}", backups.display()))
            .into()
    })
}

/// Resolve which snapshot file this run reads.
pub fn locate_snapshot(explicit: Option<&Path>, firefox_home: &Path) -> Result<SnapshotLocation> {
    let profile_dir = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ArchiverError::ProfileNotFound(format!(
                    "configured firefox_profile does not exist: {}",
                    path.display()
                ))
                .into());
            }
            if path.is_file() {
                return Ok(SnapshotLocation {
                    profile_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                    snapshot_path: path.to_path_buf(),
                });
            }
            path.to_path_buf()
        }
        None => default_profile_dir(firefox_home)?,
    };

    let snapshot_path = snapshot_in_profile(&profile_dir)?;
    Ok(SnapshotLocation {
        profile_dir,
        snapshot_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn touch(path: &Path, age_secs: u64) {
        fs::write(path, "{}").expect("write");
        let when = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(path)
            .expect("open")
            .set_modified(when)
            .expect("set mtime");
    }

    fn code_of(err: &anyhow::Error) -> &'static str {
        crate::error::ArchiverErrorCode::classify(err).as_str()
    }

    #[test]
    fn selects_default_one_profile_relative_to_home() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(PROFILES_INDEX),
            "[General]\nStartWithLastProfile=1\n\n[Profile1]\nName=other\nPath=abc.other\n\n[Profile0]\nName=main\nIsRelative=1\nPath=xyz.default\nDefault=1\n",
        )
        .expect("write ini");
        let got = default_profile_dir(tmp.path()).expect("profile");
        assert_eq!(got, tmp.path().join("xyz.default"));
    }

    #[test]
    fn absolute_profile_path_is_kept() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(PROFILES_INDEX),
            "[Profile0]\nIsRelative=0\nPath=/srv/ff/profile\nDefault=1\n",
        )
        .expect("write ini");
        let got = default_profile_dir(tmp.path()).expect("profile");
        assert_eq!(got, PathBuf::from("/srv/ff/profile"));
    }

    #[test]
    fn install_section_default_is_a_fallback() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(PROFILES_INDEX),
            "[Install4F96D1932A9F858E]\nDefault=q1w2.default-release\nLocked=1\n\n[Profile0]\nPath=q1w2.default-release\n",
        )
        .expect("write ini");
        let got = default_profile_dir(tmp.path()).expect("profile");
        assert_eq!(got, tmp.path().join("q1w2.default-release"));
    }

    #[test]
    fn missing_or_malformed_index_is_profile_not_found() {
        let tmp = tempdir().expect("tempdir");
        let err = default_profile_dir(tmp.path()).expect_err("absent index");
        assert_eq!(code_of(&err), "E001_PROFILE_NOT_FOUND");

        fs::write(tmp.path().join(PROFILES_INDEX), "Path=orphan\n").expect("write ini");
        let err = default_profile_dir(tmp.path()).expect_err("malformed index");
        assert_eq!(code_of(&err), "E001_PROFILE_NOT_FOUND");

        fs::write(tmp.path().join(PROFILES_INDEX), "[Profile0]\nPath=p\n").expect("write ini");
        let err = default_profile_dir(tmp.path()).expect_err("no default");
        assert_eq!(code_of(&err), "E001_PROFILE_NOT_FOUND");
    }

    #[test]
    fn latest_snapshot_prefers_newest_mtime_and_ignores_other_files() {
        let tmp = tempdir().expect("tempdir");
        touch(&tmp.path().join("bookmarks-2026-01-01.jsonlz4"), 300);
        touch(&tmp.path().join("bookmarks-2026-02-01.json"), 10);
        touch(&tmp.path().join("notes.txt"), 0);
        let got = latest_snapshot(tmp.path()).expect("scan");
        assert_eq!(got, Some(tmp.path().join("bookmarks-2026-02-01.json")));
    }

    #[test]
    fn explicit_profile_must_exist_and_contain_snapshots() {
        let tmp = tempdir().expect("tempdir");
        let err = locate_snapshot(Some(&tmp.path().join("gone")), tmp.path())
            .expect_err("missing profile");
        assert_eq!(code_of(&err), "E001_PROFILE_NOT_FOUND");

        let profile = tmp.path().join("profile");
        fs::create_dir_all(profile.join(BACKUPS_DIR)).expect("mkdir");
        let err = locate_snapshot(Some(&profile), tmp.path()).expect_err("empty backups");
        assert_eq!(code_of(&err), "E002_NO_SNAPSHOT");

        touch(&profile.join(BACKUPS_DIR).join("bookmarks.jsonlz4"), 0);
        let got = locate_snapshot(Some(&profile), tmp.path()).expect("located");
        assert_eq!(got.profile_dir, profile);
        assert_eq!(
            got.snapshot_path,
            profile.join(BACKUPS_DIR).join("bookmarks.jsonlz4")
        );
    }

    #[test]
    fn explicit_snapshot_file_is_used_directly() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("export.json");
        touch(&file, 0);
        let got = locate_snapshot(Some(&file), Path::new("/nonexistent")).expect("located");
        assert_eq!(got.snapshot_path, file);
    }
}
