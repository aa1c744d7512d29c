//! Title comparison helpers.
//!
//! Providers, sidecars and filenames disagree on punctuation: filenames
//! cannot contain colons, and release titles often carry a trailing
//! parenthetical disambiguator. `roughly_equal` folds both away before a
//! Unicode casefold comparison. The relation is reflexive and symmetric;
//! it is only ever applied pairwise.

use unicode_casefold::UnicodeCaseFold;

/// Full Unicode case folding (`STRASSE` == `straße`).
pub fn casefold(s: &str) -> String {
    s.case_fold_default().collect()
}

/// Casefold equality without any punctuation normalization.
pub fn casefold_eq(a: &str, b: &str) -> bool {
    casefold(a) == casefold(b)
}

/// Strip one trailing ` (...)` parenthetical suffix, if present.
fn strip_trailing_parenthetical(s: &str) -> &str {
    let trimmed = s.trim_end();
    if !trimmed.ends_with(')') {
        return s;
    }
    match trimmed.rfind(" (") {
        Some(open) => &trimmed[..open],
        None => s,
    }
}

fn canonical(s: &str) -> String {
    let dashed = s.replace(':', "-");
    casefold(strip_trailing_parenthetical(&dashed))
}

/// Whether two titles should be considered the same movie title.
pub fn roughly_equal(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}
