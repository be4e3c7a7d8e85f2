use std::env;
use std::path::PathBuf;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/archiver_env_allowlist.rs"));
}

const ENV_PREFIX: &str = "BOOKMARK_ARCHIVER_";

fn fallback_dotenv_path(home_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = home_dir?;
    Some(base.join(".config/single_file_bookmark_archiver/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Some(path) = fallback_dotenv_path(dirs::home_dir()) else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

fn unknown_env_keys<I>(keys: I, allowlist: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = keys
        .into_iter()
        .filter(|k| k.starts_with(ENV_PREFIX) && !allowlist.contains(&k.as_str()))
        .collect();
    out.sort();
    out
}

/// Flag `BOOKMARK_ARCHIVER_*` variables this build never reads (usually typos).
pub fn warn_unknown_env_keys() {
    let keys = env::vars_os().filter_map(|(k, _)| k.into_string().ok());
    for key in unknown_env_keys(keys, generated::GENERATED_ENV_ALLOWLIST) {
        log::warn!("ignoring unknown environment variable {key}");
    }
}

#[cfg(test)]
mod tests {
    use super::{ENV_PREFIX, fallback_dotenv_path, generated, unknown_env_keys};
    use std::path::PathBuf;

    #[test]
    fn fallback_lives_under_user_config_dir() {
        let got = fallback_dotenv_path(Some(PathBuf::from("/home/alice")));
        let want = Some(PathBuf::from(
            "/home/alice/.config/single_file_bookmark_archiver/.env",
        ));
        assert_eq!(got, want);
        assert_eq!(fallback_dotenv_path(None), None);
    }

    #[test]
    fn only_prefixed_unlisted_keys_are_reported() {
        let typo = format!("{ENV_PREFIX}FOLDR");
        let keys = vec![
            "PATH".to_string(),
            "BOOKMARK_ARCHIVER_FOLDER".to_string(),
            typo.clone(),
        ];
        assert_eq!(
            unknown_env_keys(keys, &["BOOKMARK_ARCHIVER_FOLDER"]),
            vec![typo]
        );
    }

    #[test]
    fn generated_allowlist_covers_config_overrides() {
        for key in [
            "BOOKMARK_ARCHIVER_CONFIG",
            "BOOKMARK_ARCHIVER_FOLDER",
            "BOOKMARK_ARCHIVER_LEDGER",
            "BOOKMARK_ARCHIVER_SINGLE_FILE_BIN",
            "BOOKMARK_ARCHIVER_FIREFOX_HOME",
        ] {
            assert!(generated::GENERATED_ENV_ALLOWLIST.contains(&key), "{key}");
        }
    }
}
