//! Letterboxd watched-export loading and watched-status aggregation.

use std::path::Path;

use crate::error::Result;
use crate::normalize::roughly_equal;
use crate::overrides::OverrideList;
use crate::types::MetadataRecord;

/// One row of the bulk export that survived validation.
#[derive(Debug, Clone)]
pub struct WatchedEntry {
    pub title: String,
    pub year: i32,
}

/// The bulk watch-history export, loaded once per run. Read-only.
#[derive(Debug, Default)]
pub struct WatchedExport {
    entries: Vec<WatchedEntry>,
}

impl WatchedExport {
    /// Load the 4-column export (date, title, year, url). The header row
    /// is skipped; rows with a different column count or an unparsable
    /// year are rejected individually with a warning, never fatally.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>)> {
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        for (i, row) in reader.records().enumerate() {
            if i == 0 {
                continue; // header
            }
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    warnings.push(format!("watched row {}: {e}", i + 1));
                    continue;
                }
            };
            if row.len() != 4 {
                warnings.push(format!(
                    "watched row {}: expected 4 columns, got {}",
                    i + 1,
                    row.len()
                ));
                continue;
            }
            let year: i32 = match row[2].parse() {
                Ok(y) => y,
                Err(_) => {
                    warnings.push(format!("watched row {}: bad year {:?}", i + 1, &row[2]));
                    continue;
                }
            };
            entries.push(WatchedEntry {
                title: row[1].to_string(),
                year,
            });
        }

        Ok((Self { entries }, warnings))
    }

    pub fn contains(&self, title: &str, year: i32) -> bool {
        self.entries
            .iter()
            .any(|e| e.year == year && roughly_equal(&e.title, title))
    }
}

/// Aggregate watched status: the bulk export matches on the record's
/// original title and release year, OR the override set holds the identity
/// id. Neither source is trusted over the other; either one is enough.
pub fn is_watched(
    record: &MetadataRecord,
    export: &WatchedExport,
    overrides: &OverrideList,
) -> bool {
    let in_export = record
        .release_year
        .is_some_and(|year| export.contains(&record.original_title, year));
    in_export || overrides.contains(&record.imdb_id)
}
