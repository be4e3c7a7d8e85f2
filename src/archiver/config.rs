use crate::archiver::paths::{ArchiverPaths, expand_home};
use crate::error::ArchiverError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "BOOKMARK_ARCHIVER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArchiverSection {
    pub bookmark_folder_name: Option<String>,
    pub archive_destination: Option<PathBuf>,
    pub processed_urls_log: Option<PathBuf>,
    /// Profile directory, or a snapshot file used as-is. Unset means auto-detect.
    pub firefox_profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleFileConfig {
    pub command: Vec<String>,
    pub extra_args: Vec<String>,
    pub timeout_secs: u64,
    pub extension: String,
}

impl Default for SingleFileConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_string(), "single-file".to_string()],
            extra_args: Vec::new(),
            timeout_secs: 300,
            extension: "html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub audit_log: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            audit_log: None,
            webhook_url: None,
            webhook_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialFileConfig {
    archiver: Option<ArchiverSection>,
    single_file: Option<SingleFileConfig>,
    status: Option<StatusConfig>,
}

/// Fully resolved run configuration handed to the reconciliation engine.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub bookmark_folder_name: String,
    pub archive_destination: PathBuf,
    pub processed_urls_log: PathBuf,
    pub firefox_profile: Option<PathBuf>,
    pub firefox_home: PathBuf,
    pub single_file: SingleFileConfig,
    pub status: StatusConfig,
    pub loaded_from: Option<PathBuf>,
}

impl ArchiverConfig {
    pub fn with_defaults(paths: &ArchiverPaths) -> Self {
        Self {
            bookmark_folder_name: "to_archive".to_string(),
            archive_destination: paths.home.join("SingleFileArchive"),
            processed_urls_log: paths.state_dir.join("processed_urls.log"),
            firefox_profile: None,
            firefox_home: paths.firefox_home.clone(),
            single_file: SingleFileConfig::default(),
            status: StatusConfig {
                audit_log: Some(paths.state_dir.join("runs.jsonl")),
                ..StatusConfig::default()
            },
            loaded_from: None,
        }
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    ArchiverError::InvalidConfig(message.into()).into()
}

fn validate(cfg: &ArchiverConfig) -> Result<()> {
    if cfg.bookmark_folder_name.is_empty() {
        return Err(invalid("bookmark_folder_name cannot be empty"));
    }
    if cfg.single_file.command.iter().all(|part| part.trim().is_empty()) {
        return Err(invalid("single_file.command cannot be empty"));
    }
    if cfg.single_file.timeout_secs == 0 {
        return Err(invalid("single_file.timeout_secs must be >= 1 second"));
    }
    let ext = cfg.single_file.extension.trim_start_matches('.');
    if ext.is_empty() || ext.contains('/') || ext.contains('\\') {
        return Err(invalid(
            "single_file.extension must be a bare extension such as `html`",
        ));
    }
    if cfg.status.webhook_timeout_secs == 0 {
        return Err(invalid("status.webhook_timeout_secs must be >= 1 second"));
    }
    Ok(())
}

/// Pick the config file: CLI argument, then env, then the per-user default.
/// The flag is true when the file was named explicitly and so must exist.
fn resolve_config_path(explicit: Option<&Path>, paths: &ArchiverPaths) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    if let Some(custom) = env_non_empty(CONFIG_PATH_ENV) {
        return (PathBuf::from(custom), true);
    }
    (paths.config_dir.join("config.toml"), false)
}

fn merge_file_config(base: &mut ArchiverConfig, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .map_err(|err| invalid(format!("failed to read {}: {err}", path.display())))?;
    let parsed: PartialFileConfig = toml::from_str(&raw)
        .map_err(|err| invalid(format!("failed to parse {}: {err}", path.display())))?;

    if let Some(section) = parsed.archiver {
        if let Some(name) = section.bookmark_folder_name {
            base.bookmark_folder_name = name;
        }
        if let Some(dest) = section.archive_destination {
            base.archive_destination = dest;
        }
        if let Some(log) = section.processed_urls_log {
            base.processed_urls_log = log;
        }
        if section.firefox_profile.is_some() {
            base.firefox_profile = section.firefox_profile;
        }
    }
    if let Some(single_file) = parsed.single_file {
        base.single_file = single_file;
    }
    if let Some(status) = parsed.status {
        base.status = status;
    }
    base.loaded_from = Some(path.to_path_buf());
    Ok(())
}

fn apply_env_overrides(cfg: &mut ArchiverConfig) {
    cfg.bookmark_folder_name =
        env_or_string("BOOKMARK_ARCHIVER_FOLDER", &cfg.bookmark_folder_name);
    if let Some(dest) = env_non_empty("BOOKMARK_ARCHIVER_DESTINATION") {
        cfg.archive_destination = PathBuf::from(dest);
    }
    if let Some(ledger) = env_non_empty("BOOKMARK_ARCHIVER_LEDGER") {
        cfg.processed_urls_log = PathBuf::from(ledger);
    }
    if let Some(profile) = env_non_empty("BOOKMARK_ARCHIVER_FIREFOX_PROFILE") {
        cfg.firefox_profile = Some(PathBuf::from(profile));
    }
    if let Some(bin) = env_non_empty("BOOKMARK_ARCHIVER_SINGLE_FILE_BIN") {
        cfg.single_file.command = vec![bin];
    }
    cfg.single_file.timeout_secs =
        env_or_u64("BOOKMARK_ARCHIVER_TIMEOUT_SECS", cfg.single_file.timeout_secs);
    if let Some(audit) = env_non_empty("BOOKMARK_ARCHIVER_AUDIT_LOG") {
        cfg.status.audit_log = Some(PathBuf::from(audit));
    }
    if let Some(url) = env_non_empty("BOOKMARK_ARCHIVER_WEBHOOK_URL") {
        cfg.status.webhook_url = Some(url);
    }
}

fn expand_paths(cfg: &mut ArchiverConfig, home: &Path) {
    let expand = |p: &Path| expand_home(&p.to_string_lossy(), home);
    cfg.archive_destination = expand(&cfg.archive_destination);
    cfg.processed_urls_log = expand(&cfg.processed_urls_log);
    cfg.firefox_profile = cfg.firefox_profile.as_deref().map(expand);
    cfg.status.audit_log = cfg.status.audit_log.as_deref().map(expand);
    cfg.single_file.extension = cfg.single_file.extension.trim_start_matches('.').to_string();
}

pub fn load_config(explicit: Option<&Path>, paths: &ArchiverPaths) -> Result<ArchiverConfig> {
    let mut cfg = ArchiverConfig::with_defaults(paths);

    let (path, required) = resolve_config_path(explicit, paths);
    if path.exists() {
        merge_file_config(&mut cfg, &path)?;
    } else if required {
        return Err(invalid(format!("config file not found: {}", path.display())));
    }

    apply_env_overrides(&mut cfg);
    expand_paths(&mut cfg, &paths.home);
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_paths(root: &Path) -> ArchiverPaths {
        ArchiverPaths {
            home: root.to_path_buf(),
            config_dir: root.join("config"),
            state_dir: root.join("state"),
            firefox_home: root.join("firefox"),
        }
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        let mut cfg = ArchiverConfig::with_defaults(&paths);
        expand_paths(&mut cfg, &paths.home);
        validate(&cfg).expect("defaults are valid");
        assert_eq!(cfg.bookmark_folder_name, "to_archive");
        assert_eq!(
            cfg.processed_urls_log,
            tmp.path().join("state/processed_urls.log")
        );
        assert_eq!(cfg.single_file.command, vec!["npx", "single-file"]);
    }

    #[test]
    fn explicit_missing_file_is_invalid_config() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        let err = load_config(Some(&tmp.path().join("nope.toml")), &paths)
            .expect_err("explicit path must exist");
        assert!(matches!(
            err.downcast_ref::<ArchiverError>(),
            Some(ArchiverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn file_sections_merge_over_defaults_and_expand_home() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        let file = tmp.path().join("config.toml");
        fs::write(
            &file,
            r#"
[archiver]
bookmark_folder_name = "read later"
archive_destination = "~/pages"

[single_file]
command = ["/opt/single-file"]
timeout_secs = 42
extension = ".htm"
"#,
        )
        .expect("write config");

        let mut cfg = ArchiverConfig::with_defaults(&paths);
        merge_file_config(&mut cfg, &file).expect("merge");
        expand_paths(&mut cfg, &paths.home);
        validate(&cfg).expect("valid");

        assert_eq!(cfg.bookmark_folder_name, "read later");
        assert_eq!(cfg.archive_destination, tmp.path().join("pages"));
        assert_eq!(
            cfg.processed_urls_log,
            tmp.path().join("state/processed_urls.log")
        );
        assert_eq!(cfg.single_file.timeout_secs, 42);
        assert_eq!(cfg.single_file.extension, "htm");
        assert!(cfg.single_file.extra_args.is_empty());
        assert_eq!(cfg.loaded_from.as_deref(), Some(file.as_path()));
    }

    #[test]
    fn malformed_toml_is_invalid_config() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        let file = tmp.path().join("config.toml");
        fs::write(&file, "[archiver\nbookmark_folder_name = 3").expect("write config");
        let mut cfg = ArchiverConfig::with_defaults(&paths);
        let err = merge_file_config(&mut cfg, &file).expect_err("must fail");
        assert!(format!("{err}").contains("failed to parse"));
    }

    #[test]
    fn validation_rejects_zero_timeout_and_path_like_extension() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());

        let mut cfg = ArchiverConfig::with_defaults(&paths);
        cfg.single_file.timeout_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = ArchiverConfig::with_defaults(&paths);
        cfg.single_file.extension = "../html".to_string();
        assert!(validate(&cfg).is_err());

        let mut cfg = ArchiverConfig::with_defaults(&paths);
        cfg.bookmark_folder_name.clear();
        assert!(validate(&cfg).is_err());
    }
}
