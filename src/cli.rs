//! CLI: argument parsing, library walk, run loop and summary.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use clap::Parser;
use regex::Regex;
use tracing::{info, warn};

use crate::awards::AwardIndex;
use crate::config::Config;
use crate::engine::{Engine, Outcome};
use crate::error::Result;
use crate::overrides::OverrideList;
use crate::prompt::{AssumeYes, Confirm, StdinConfirm};
use crate::title;
use crate::tmdb::TmdbClient;
use crate::types::LibraryEntry;
use crate::watched::WatchedExport;

const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

#[derive(Parser)]
#[command(
    name = "nfosync",
    about = "Reconcile movie.nfo sidecars against TMDB, a Letterboxd export and award lists"
)]
pub struct Cli {
    /// TMDB API key.
    #[arg(long, env = "NFOSYNC_TMDB_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Library root containing decade directories (e.g. 1990-1999).
    #[arg(long)]
    root: PathBuf,
    /// Letterboxd watched-export CSV.
    #[arg(long)]
    watched: PathBuf,
    /// Watched override-list CSV (created on first append).
    #[arg(long)]
    overrides: PathBuf,
    /// Directory of per-category award CSVs.
    #[arg(long)]
    awards: Option<PathBuf>,
    /// Accept every prompt without asking (batch mode).
    #[arg(long)]
    assume_yes: bool,
}

impl Cli {
    pub fn into_config(self) -> Config {
        Config {
            api_key: self.api_key,
            root: self.root,
            watched_csv: self.watched,
            overrides_csv: self.overrides,
            awards_dir: self.awards,
            assume_yes: self.assume_yes,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub entries: usize,
    pub reconciled: usize,
    pub created: usize,
    pub skipped: usize,
    pub diagnostics: usize,
}

fn decade_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{4}$").expect("decade pattern must compile"))
}

struct WalkResult {
    files: Vec<PathBuf>,
    warnings: Vec<String>,
}

/// Collect video files under the root's decade directories. Unreadable
/// directories become warnings, never failures; results are sorted for a
/// deterministic processing order.
fn walk_video_files(root: &Path) -> Result<WalkResult> {
    let mut files = Vec::new();
    let mut warnings = Vec::new();
    let mut dirs = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warnings.push(format!("dir entry error in {}: {e}", root.display()));
                continue;
            }
        };
        let path = entry.path();
        let is_decade_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| decade_pattern().is_match(n));
        if is_decade_dir {
            dirs.push(path);
        }
    }

    while let Some(dir) = dirs.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warnings.push(format!("cannot read {}: {e}", dir.display()));
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warnings.push(format!("dir entry error in {}: {e}", dir.display()));
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
                continue;
            }
            let is_video = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if is_video {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(WalkResult { files, warnings })
}

/// Filenames that do not match the title pattern are dropped silently.
fn to_entries(files: Vec<PathBuf>) -> Vec<LibraryEntry> {
    files
        .into_iter()
        .filter_map(|path| {
            let filename = path.file_name()?.to_str()?;
            let (title, year) = title::parse_title_year(filename)?;
            Some(LibraryEntry { path, title, year })
        })
        .collect()
}

async fn process_all<C: Confirm + ?Sized>(
    entries: &[LibraryEntry],
    tmdb: &TmdbClient,
    export: &WatchedExport,
    overrides: &mut OverrideList,
    awards: &AwardIndex,
    confirm: &mut C,
) -> RunSummary {
    let mut summary = RunSummary {
        entries: entries.len(),
        ..RunSummary::default()
    };
    let mut engine = Engine::new(tmdb, export, overrides, awards, confirm);

    for entry in entries {
        let report = engine.process_entry(entry).await;
        match report.outcome {
            Outcome::Reconciled => summary.reconciled += 1,
            Outcome::Created => summary.created += 1,
            Outcome::Skipped => summary.skipped += 1,
        }
        summary.diagnostics += report.diagnostics.len();
        for diagnostic in &report.diagnostics {
            warn!("{}: {diagnostic}", report.path.display());
        }
    }
    summary
}

pub async fn run(config: Config) -> Result<RunSummary> {
    let (export, warnings) = WatchedExport::load(&config.watched_csv)?;
    for warning in warnings {
        warn!("{warning}");
    }

    let (mut overrides, warnings) = OverrideList::load(&config.overrides_csv)?;
    for warning in warnings {
        warn!("{warning}");
    }

    let awards = match &config.awards_dir {
        Some(dir) => {
            let (index, warnings) = AwardIndex::load_dir(dir)?;
            for warning in warnings {
                warn!("{warning}");
            }
            index
        }
        None => AwardIndex::empty(),
    };

    let walk = walk_video_files(&config.root)?;
    for warning in walk.warnings {
        warn!("{warning}");
    }
    let entries = to_entries(walk.files);

    let tmdb = TmdbClient::new(config.api_key.clone());
    let summary = if config.assume_yes {
        let mut confirm = AssumeYes;
        process_all(&entries, &tmdb, &export, &mut overrides, &awards, &mut confirm).await
    } else {
        let mut confirm = StdinConfirm;
        process_all(&entries, &tmdb, &export, &mut overrides, &awards, &mut confirm).await
    };

    info!(
        "{} entries: {} reconciled, {} created, {} skipped, {} diagnostics",
        summary.entries, summary.reconciled, summary.created, summary.skipped, summary.diagnostics
    );
    Ok(summary)
}
