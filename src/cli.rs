use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::commands::archive_run::{self, ArchiveRunOptions};

/// Archive every new URL in a Firefox bookmark folder with SingleFile.
#[derive(Debug, Parser)]
#[command(name = "bookmark-archiver", version, about)]
struct Cli {
    /// Config file; defaults to $BOOKMARK_ARCHIVER_CONFIG, then
    /// ~/.config/single_file_bookmark_archiver/config.toml.
    config: Option<PathBuf>,

    /// Resolve, parse and diff only; archive nothing and leave the ledger alone.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = archive_run::run(&ArchiveRunOptions {
        config_path: cli.config,
        dry_run: cli.dry_run,
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_config_is_optional() {
        let bare = Cli::try_parse_from(["bookmark-archiver"]).expect("parse");
        assert!(bare.config.is_none());
        let with = Cli::try_parse_from(["bookmark-archiver", "/etc/arch.toml", "--json"])
            .expect("parse");
        assert_eq!(
            with.config.as_deref(),
            Some(std::path::Path::new("/etc/arch.toml"))
        );
        assert!(with.json);
    }
}
