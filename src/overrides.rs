//! Manual watched-override list.
//!
//! A small append-only CSV (title, identity id) of movies considered
//! watched regardless of what the bulk export says. The reconciliation
//! engine appends to it after explicit user confirmation; nothing ever
//! removes an entry.

use std::collections::HashSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

const HEADER: [&str; 2] = ["title", "imdb_id"];

#[derive(Debug)]
pub struct OverrideList {
    path: PathBuf,
    ids: HashSet<String>,
}

impl OverrideList {
    /// Load the list. A missing file is an empty list, not an error.
    /// Returns per-row warnings for rows that are not two columns wide.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>)> {
        let mut ids = HashSet::new();
        let mut warnings = Vec::new();

        if path.exists() {
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
                        warnings.push(format!("override row {}: {e}", i + 1));
                        continue;
                    }
                };
                if row.len() != 2 {
                    warnings.push(format!(
                        "override row {}: expected 2 columns, got {}",
                        i + 1,
                        row.len()
                    ));
                    continue;
                }
                ids.insert(row[1].to_string());
            }
        }

        Ok((
            Self {
                path: path.to_path_buf(),
                ids,
            },
            warnings,
        ))
    }

    pub fn contains(&self, imdb_id: &str) -> bool {
        self.ids.contains(imdb_id)
    }

    /// Append one entry, writing the header first if the file does not
    /// exist yet. The full new content is staged and renamed into place.
    pub fn append(&mut self, title: &str, imdb_id: &str) -> Result<()> {
        let mut content = match fs::read_to_string(&self.path) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => encode_row(&HEADER)?,
            Err(e) => return Err(e.into()),
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&encode_row(&[title, imdb_id])?);

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        self.ids.insert(imdb_id.to_string());
        Ok(())
    }
}

fn encode_row(fields: &[&str]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| SyncError::Parse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SyncError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let (list, warnings) = OverrideList::load(&dir.path().join("overrides.csv")).unwrap();
        assert!(!list.contains("tt0113277"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn first_append_writes_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.csv");
        let (mut list, _) = OverrideList::load(&path).unwrap();

        list.append("Heat", "tt0113277").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "title,imdb_id\nHeat,tt0113277\n");
        assert!(list.contains("tt0113277"));
    }

    #[test]
    fn append_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.csv");
        let (mut list, _) = OverrideList::load(&path).unwrap();

        list.append("Heat", "tt0113277").unwrap();
        list.append("Ronin", "tt0122690").unwrap();

        let (reloaded, warnings) = OverrideList::load(&path).unwrap();
        assert!(warnings.is_empty());
        assert!(reloaded.contains("tt0113277"));
        assert!(reloaded.contains("tt0122690"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("title,imdb_id\n"));
    }

    #[test]
    fn titles_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.csv");
        let (mut list, _) = OverrideList::load(&path).unwrap();

        list.append("The Good, the Bad and the Ugly", "tt0060196").unwrap();
        let (reloaded, warnings) = OverrideList::load(&path).unwrap();
        assert!(warnings.is_empty());
        assert!(reloaded.contains("tt0060196"));
    }

    #[test]
    fn malformed_rows_warn_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.csv");
        std::fs::write(&path, "title,imdb_id\nHeat,tt0113277\nonly-one-column\n").unwrap();

        let (list, warnings) = OverrideList::load(&path).unwrap();
        assert!(list.contains("tt0113277"));
        assert_eq!(warnings.len(), 1);
    }
}
