//! Run configuration.
//!
//! One explicit value threaded into every component constructor. There is
//! no module-level configuration state anywhere in the crate.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// TMDB API key.
    pub api_key: String,
    /// Library root containing decade directories.
    pub root: PathBuf,
    /// Letterboxd watched-export CSV.
    pub watched_csv: PathBuf,
    /// Watched override-list CSV (created on first append).
    pub overrides_csv: PathBuf,
    /// Directory of per-category award CSVs, if any.
    pub awards_dir: Option<PathBuf>,
    /// Accept every prompt without asking.
    pub assume_yes: bool,
}
