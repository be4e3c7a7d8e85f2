use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

pub const APP_ID: &str = "single_file_bookmark_archiver";

#[derive(Debug, Clone)]
pub struct ArchiverPaths {
    pub home: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub firefox_home: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

/// Expand a leading `~` against `home`; anything else is returned untouched.
pub fn expand_home(raw: &str, home: &Path) -> PathBuf {
    let trimmed = raw.trim();
    if trimmed == "~" {
        return home.to_path_buf();
    }
    match trimmed.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(trimmed),
    }
}

pub fn resolve_paths() -> Result<ArchiverPaths> {
    let home = required_home_dir()?;
    let config_dir = home.join(".config").join(APP_ID);
    let state_dir = home.join(".local/state").join(APP_ID);
    let firefox_home = env_or_default_path(
        "BOOKMARK_ARCHIVER_FIREFOX_HOME",
        home.join(".mozilla/firefox"),
    );

    Ok(ArchiverPaths {
        home,
        config_dir,
        state_dir,
        firefox_home,
    })
}

#[cfg(test)]
mod tests {
    use super::expand_home;
    use std::path::{Path, PathBuf};

    #[test]
    fn expand_home_rewrites_tilde_prefix_only() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_home("~/archive", home),
            PathBuf::from("/home/alice/archive")
        );
        assert_eq!(expand_home("~", home), PathBuf::from("/home/alice"));
        assert_eq!(expand_home("/srv/~x", home), PathBuf::from("/srv/~x"));
        assert_eq!(expand_home("~bob/x", home), PathBuf::from("~bob/x"));
    }
}
