use std::path::PathBuf;

/// One candidate movie file found during the library walk. Ephemeral,
/// rebuilt on every run.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub path: PathBuf,
    /// Title parsed from the filename, before any provider resolution.
    pub title: String,
    /// 4-digit year token parsed from the filename.
    pub year: i32,
}

/// Canonical metadata for one movie, as resolved from the provider.
/// Lives only for the duration of one reconciliation step.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// Provider-internal catalog id (TMDB).
    pub tmdb_id: u64,
    /// Cross-catalog identity id (`tt` followed by digits).
    pub imdb_id: String,
    pub title: String,
    pub original_title: String,
    pub release_year: Option<i32>,
}

/// Cast and directors, fetched only when presenting a creation prompt.
#[derive(Debug, Clone, Default)]
pub struct Credits {
    /// Top-billed cast, already truncated to the display count.
    pub cast: Vec<String>,
    pub directors: Vec<String>,
}
