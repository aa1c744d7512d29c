//! Filename → (title, year) extraction.

use std::sync::OnceLock;

use regex::Regex;

/// Matches `Movie Title (optional stuff, 2024, optional).mkv`: the title is
/// everything before the first opening parenthesis, the year is the 4-digit
/// token between comma-separated extras. The year is a token, not a
/// validated calendar year.
fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.*?)\s*\((?:.*?, )*(\d{4})(?:, .*?)*\)\.[A-Za-z0-9]+$")
            .expect("title pattern must compile")
    })
}

/// Parse a candidate (title, year) pair out of a filename.
///
/// Returns `None` when the filename does not match the pattern. That is not
/// an error: callers skip unmatched filenames silently.
pub fn parse_title_year(filename: &str) -> Option<(String, i32)> {
    let caps = title_pattern().captures(filename)?;
    let title = caps.get(1)?.as_str().trim().to_string();
    let year: i32 = caps.get(2)?.as_str().parse().ok()?;
    Some((title, year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_title_and_year() {
        assert_eq!(
            parse_title_year("Inception (2010).mkv"),
            Some(("Inception".to_string(), 2010))
        );
    }

    #[test]
    fn extra_tokens_before_year() {
        assert_eq!(
            parse_title_year("Blade Runner (Final Cut, 1982).mkv"),
            Some(("Blade Runner".to_string(), 1982))
        );
    }

    #[test]
    fn extra_tokens_after_year() {
        assert_eq!(
            parse_title_year("Brazil (1985, VOSTFR).mkv"),
            Some(("Brazil".to_string(), 1985))
        );
        assert_eq!(
            parse_title_year("Dune (Director's Cut, 1984, Remux).mkv"),
            Some(("Dune".to_string(), 1984))
        );
    }

    #[test]
    fn year_is_a_token_not_a_calendar_year() {
        assert_eq!(
            parse_title_year("Time Travel (9999).mkv"),
            Some(("Time Travel".to_string(), 9999))
        );
    }

    #[test]
    fn no_match_is_none() {
        assert_eq!(parse_title_year("Inception.mkv"), None);
        assert_eq!(parse_title_year("Inception (2010)"), None);
        assert_eq!(parse_title_year("Inception (201).mkv"), None);
        assert_eq!(parse_title_year("notes.txt"), None);
    }

    #[test]
    fn parenthetical_title_keeps_text_before_first_paren() {
        assert_eq!(
            parse_title_year("Mother (Mom, 2009).mkv"),
            Some(("Mother".to_string(), 2009))
        );
    }
}
