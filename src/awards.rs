//! Award index: which identity ids hold which award category.
//!
//! Loaded once per run from a directory of per-category CSV files; the
//! category name is the file stem. Each file is two columns (display
//! title, identity id); the display title only exists for human editing
//! and is discarded on load.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Default)]
pub struct AwardIndex {
    categories: BTreeMap<String, HashSet<String>>,
}

impl AwardIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.csv` in `dir` as one category. Header rows are
    /// skipped; malformed rows are reported individually.
    pub fn load_dir(dir: &Path) -> Result<(Self, Vec<String>)> {
        let mut categories = BTreeMap::new();
        let mut warnings = Vec::new();

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .collect();
        paths.sort();

        for path in paths {
            let category = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let mut ids = HashSet::new();

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&path)?;
            for (i, row) in reader.records().enumerate() {
                if i == 0 {
                    continue; // header
                }
                let row = match row {
                    Ok(r) => r,
                    Err(e) => {
                        warnings.push(format!("{category} row {}: {e}", i + 1));
                        continue;
                    }
                };
                if row.len() != 2 {
                    warnings.push(format!(
                        "{category} row {}: expected 2 columns, got {}",
                        i + 1,
                        row.len()
                    ));
                    continue;
                }
                ids.insert(row[1].to_string());
            }

            categories.insert(category, ids);
        }

        Ok((Self { categories }, warnings))
    }

    /// Every category that contains this identity id, in name order.
    pub fn categories_for(&self, imdb_id: &str) -> BTreeSet<String> {
        self.categories
            .iter()
            .filter(|(_, ids)| ids.contains(imdb_id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn all_categories(&self) -> BTreeSet<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn is_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn holds(&self, category: &str, imdb_id: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|ids| ids.contains(imdb_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_from(files: &[(&str, &str)]) -> (AwardIndex, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        AwardIndex::load_dir(dir.path()).unwrap()
    }

    #[test]
    fn categories_load_from_file_stems() {
        let (index, warnings) = index_from(&[
            ("oscar_best_picture.csv", "title,imdb_id\nThe Godfather,tt0068646\n"),
            ("palme_dor.csv", "title,imdb_id\nTaxi Driver,tt0075314\n"),
        ]);
        assert!(warnings.is_empty());
        assert_eq!(
            index.all_categories(),
            BTreeSet::from(["oscar_best_picture".to_string(), "palme_dor".to_string()])
        );
        assert!(index.holds("oscar_best_picture", "tt0068646"));
        assert!(!index.holds("palme_dor", "tt0068646"));
    }

    #[test]
    fn categories_for_collects_across_files() {
        let (index, _) = index_from(&[
            ("oscar_best_picture.csv", "title,imdb_id\nParasite,tt6751668\n"),
            ("palme_dor.csv", "title,imdb_id\nParasite,tt6751668\n"),
        ]);
        assert_eq!(
            index.categories_for("tt6751668"),
            BTreeSet::from(["oscar_best_picture".to_string(), "palme_dor".to_string()])
        );
        assert!(index.categories_for("tt0000001").is_empty());
    }

    #[test]
    fn malformed_rows_warn_and_are_skipped() {
        let (index, warnings) = index_from(&[(
            "oscar_best_picture.csv",
            "title,imdb_id\nThe Godfather,tt0068646\nbroken-row\n",
        )]);
        assert_eq!(warnings.len(), 1);
        assert!(index.holds("oscar_best_picture", "tt0068646"));
    }

    #[test]
    fn non_csv_files_are_ignored() {
        let (index, _) = index_from(&[
            ("oscar_best_picture.csv", "title,imdb_id\nThe Godfather,tt0068646\n"),
            ("README.txt", "not a category"),
        ]);
        assert_eq!(index.all_categories().len(), 1);
    }

    #[test]
    fn empty_index_answers_queries() {
        let index = AwardIndex::empty();
        assert!(index.all_categories().is_empty());
        assert!(index.categories_for("tt0068646").is_empty());
        assert!(!index.is_category("oscar_best_picture"));
    }
}
