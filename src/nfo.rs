//! Sidecar (`movie.nfo`) reading, writing and idempotent mutation.
//!
//! A sidecar file is one structured XML document occupying every line but
//! the last, followed by exactly one plain-text line holding the canonical
//! IMDb URL for the movie. This module is the only code allowed to touch
//! sidecar files. All writes are whole-file replacements staged through a
//! temp file in the target directory and renamed into place, so a crash
//! mid-write never leaves a truncated or mixed file.
//!
//! Elements this tool does not understand (Kodi writes plenty) are parsed
//! into a generic tree and serialized back out unchanged, so a mutation
//! only ever appends the element it is about.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{Result, SyncError};

pub const SIDECAR_FILENAME: &str = "movie.nfo";

const ROOT_TAG: &str = "movie";
const TITLE_TAG: &str = "title";
const WATCHED_TAG: &str = "playcount";
const TAG_TAG: &str = "tag";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const IMDB_TITLE_URL: &str = "https://www.imdb.com/title/";

/// Alternate provider URL prefixes on the trailing line that are silently
/// treated as "no identity hint" instead of being reported. Explicit
/// allow-list; anything else non-empty that is not the canonical IMDb
/// shape gets reported.
const ALT_IDENTITY_PREFIXES: &[&str] = &["https://www.themoviedb.org/movie/"];

fn identity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://www\.imdb\.com/title/(tt[0-9]+)$")
            .expect("identity pattern must compile")
    })
}

/// Extract the identity id from a canonical IMDb URL line. Exact shape
/// only: no trailing slash, no other scheme, no missing `www`.
pub fn parse_identity_line(line: &str) -> Option<&str> {
    identity_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Build the canonical trailing line for an identity id.
pub fn identity_line(imdb_id: &str) -> String {
    format!("{IMDB_TITLE_URL}{imdb_id}")
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// One XML element. Either a leaf (text, possibly empty) or a parent
/// (children, no text) — mixed content is rejected at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn leaf(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            text: text.to_string(),
            children: Vec::new(),
        }
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parsed sidecar: the structured document plus the trailing identity line,
/// kept verbatim so a rewrite preserves whatever was there.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarDocument {
    pub root: XmlElement,
    pub trailing: String,
}

impl SidecarDocument {
    /// Minimal document: title, watched marker when applicable, canonical
    /// trailing line.
    pub fn new(title: &str, imdb_id: &str, watched: bool) -> Self {
        let mut root = XmlElement {
            name: ROOT_TAG.to_string(),
            attrs: Vec::new(),
            text: String::new(),
            children: vec![XmlElement::leaf(TITLE_TAG, title)],
        };
        if watched {
            root.children.push(XmlElement::leaf(WATCHED_TAG, "1"));
        }
        Self {
            root,
            trailing: identity_line(imdb_id),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.root.child(TITLE_TAG).map(|el| el.text.trim())
    }

    /// Presence-based: the marker's count text is not interpreted.
    pub fn watched(&self) -> bool {
        self.root.child(WATCHED_TAG).is_some()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.root
            .children
            .iter()
            .filter(|c| c.name == TAG_TAG)
            .map(|c| c.text.trim())
            .collect()
    }

}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn build_element(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SyncError::Parse(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| SyncError::Parse(format!("bad attribute value: {e}")))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name,
        attrs,
        text: String::new(),
        children: Vec::new(),
    })
}

fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SyncError::Parse(format!("XML parsing error: {e}")))?;
        match event {
            Event::Start(e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(SyncError::Parse("more than one root element".to_string()));
                }
                stack.push(build_element(&e)?);
            }
            Event::Empty(e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(SyncError::Parse("more than one root element".to_string()));
                }
                let element = build_element(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let finished = stack
                    .pop()
                    .ok_or_else(|| SyncError::Parse("unbalanced end tag".to_string()))?;
                if !finished.text.is_empty() && !finished.children.is_empty() {
                    return Err(SyncError::Parse(format!(
                        "mixed content in <{}>",
                        finished.name
                    )));
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(finished),
                    None => root = Some(finished),
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SyncError::Parse(format!("bad text: {e}")))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(SyncError::Parse(
                            "text outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t).to_string();
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None => {
                        return Err(SyncError::Parse(
                            "CDATA outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SyncError::Parse("unclosed element".to_string()));
    }
    root.ok_or_else(|| SyncError::Parse("no root element".to_string()))
}

/// Parse the full sidecar text (structured part + trailing line).
pub fn parse_sidecar(content: &str) -> Result<SidecarDocument> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return Err(SyncError::Parse(
            "sidecar too short: expected a document plus a trailing identity line".to_string(),
        ));
    }
    let trailing = lines[lines.len() - 1].trim();
    if trailing.contains('<') || trailing.contains('>') {
        return Err(SyncError::Parse(
            "trailing line contains markup".to_string(),
        ));
    }
    let xml = lines[..lines.len() - 1].join("\n");
    let root = parse_document(&xml)?;
    if root.name != ROOT_TAG {
        return Err(SyncError::Validation(format!(
            "root element is <{}>, expected <{ROOT_TAG}>",
            root.name
        )));
    }
    if root.child(TITLE_TAG).is_none() {
        return Err(SyncError::Validation(format!(
            "<{TITLE_TAG}> not found under <{ROOT_TAG}>"
        )));
    }
    Ok(SidecarDocument {
        root,
        trailing: trailing.to_string(),
    })
}

/// Read and parse the sidecar at `path`.
pub fn read(path: &Path) -> Result<SidecarDocument> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::NotFound(format!(
                "no sidecar at {}",
                path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    parse_sidecar(&content)
}

/// Outcome of the fast-path identity probe on the trailing line.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityHint {
    Found(String),
    Absent,
    /// Non-empty trailing line that is neither the canonical shape nor an
    /// allow-listed alternate. Reported by the engine, never acted on.
    Unrecognized(String),
}

/// Probe only the trailing line of a sidecar for an identity id.
pub fn read_identity_hint(path: &Path) -> Result<IdentityHint> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IdentityHint::Absent),
        Err(e) => return Err(e.into()),
    };
    let line = content.lines().last().unwrap_or("").trim();
    Ok(classify_trailing_line(line))
}

fn classify_trailing_line(line: &str) -> IdentityHint {
    if line.is_empty() {
        return IdentityHint::Absent;
    }
    if let Some(id) = parse_identity_line(line) {
        return IdentityHint::Found(id.to_string());
    }
    if ALT_IDENTITY_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return IdentityHint::Absent;
    }
    IdentityHint::Unrecognized(line.to_string())
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Escape special characters for XML text and attribute values. Applied
/// uniformly to every user-facing field; there is no other escaping path.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_element(out: &mut String, element: &XmlElement, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&xml_escape(value));
        out.push('"');
    }
    if element.children.is_empty() {
        if element.text.is_empty() {
            out.push_str("/>\n");
        } else {
            out.push('>');
            out.push_str(&xml_escape(&element.text));
            out.push_str("</");
            out.push_str(&element.name);
            out.push_str(">\n");
        }
    } else {
        out.push_str(">\n");
        for child in &element.children {
            write_element(out, child, depth + 1);
        }
        out.push_str(&indent);
        out.push_str("</");
        out.push_str(&element.name);
        out.push_str(">\n");
    }
}

/// Serialize a sidecar document to its on-disk text.
pub fn serialize(doc: &SidecarDocument) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(XML_DECLARATION);
    out.push('\n');
    write_element(&mut out, &doc.root, 0);
    out.push_str(&doc.trailing);
    out.push('\n');
    out
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| SyncError::Io(e.error))?;
    Ok(())
}

/// Whole-file replace of the sidecar at `path`.
pub fn write(path: &Path, doc: &SidecarDocument) -> Result<()> {
    write_atomic(path, &serialize(doc))
}

/// Create a minimal sidecar: title, watched marker when applicable, and the
/// canonical trailing identity line.
pub fn create(path: &Path, title: &str, imdb_id: &str, watched: bool) -> Result<()> {
    write(path, &SidecarDocument::new(title, imdb_id, watched))
}

/// Append one `<tag>` element and rewrite. Does not deduplicate; callers
/// check for absence first.
pub fn add_tag(path: &Path, value: &str) -> Result<()> {
    let mut doc = read(path)?;
    doc.root.children.push(XmlElement::leaf(TAG_TAG, value));
    write(path, &doc)
}

/// Append the watched marker iff absent. Returns whether a mutation
/// occurred.
pub fn mark_watched(path: &Path) -> Result<bool> {
    let mut doc = read(path)?;
    if doc.watched() {
        return Ok(false);
    }
    doc.root.children.push(XmlElement::leaf(WATCHED_TAG, "1"));
    write(path, &doc)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializer_output_shape() {
        let doc = SidecarDocument::new("Inception", "tt1375666", true);
        assert_eq!(
            serialize(&doc),
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <movie>\n\
             \x20\x20<title>Inception</title>\n\
             \x20\x20<playcount>1</playcount>\n\
             </movie>\n\
             https://www.imdb.com/title/tt1375666\n"
        );
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILENAME);

        let mut doc = SidecarDocument::new("Heat", "tt0113277", true);
        doc.root.children.push(XmlElement::leaf("tag", "Crime"));
        doc.root.children.push(XmlElement::leaf("tag", "Los Angeles"));
        write(&path, &doc).unwrap();

        let reread = read(&path).unwrap();
        assert_eq!(reread, doc);
        assert_eq!(reread.title(), Some("Heat"));
        assert!(reread.watched());
        assert_eq!(reread.tags(), vec!["Crime", "Los Angeles"]);
        assert_eq!(parse_identity_line(&reread.trailing), Some("tt0113277"));
    }

    #[test]
    fn unknown_elements_survive_a_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILENAME);
        let content = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <movie>\n\
             \x20\x20<title>Heat</title>\n\
             \x20\x20<ratings>\n\
             \x20\x20\x20\x20<rating name=\"imdb\" max=\"10\">8.3</rating>\n\
             \x20\x20</ratings>\n\
             \x20\x20<plot>Neil McCauley plans one last score.</plot>\n\
             </movie>\n\
             https://www.imdb.com/title/tt0113277\n";
        std::fs::write(&path, content).unwrap();

        assert!(mark_watched(&path).unwrap());
        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.contains("<rating name=\"imdb\" max=\"10\">8.3</rating>"));
        assert!(after.contains("<plot>Neil McCauley plans one last score.</plot>"));
        assert!(after.contains("<playcount>1</playcount>"));
        assert!(after.ends_with("https://www.imdb.com/title/tt0113277\n"));
    }

    #[test]
    fn mark_watched_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILENAME);
        create(&path, "Heat", "tt0113277", false).unwrap();

        assert!(mark_watched(&path).unwrap());
        assert!(!mark_watched(&path).unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("<playcount>").count(), 1);
    }

    #[test]
    fn add_tag_does_not_deduplicate() {
        // Deduplication is the caller's job; the store appends blindly.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILENAME);
        create(&path, "Heat", "tt0113277", false).unwrap();

        add_tag(&path, "Crime").unwrap();
        add_tag(&path, "Crime").unwrap();
        let doc = read(&path).unwrap();
        assert_eq!(doc.tags(), vec!["Crime", "Crime"]);
    }

    #[test]
    fn escaped_text_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIDECAR_FILENAME);
        create(&path, "Fast & Furious <VF>", "tt1013752", false).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("<title>Fast &amp; Furious &lt;VF&gt;</title>"));
        assert_eq!(read(&path).unwrap().title(), Some("Fast & Furious <VF>"));
    }

    #[test]
    fn too_short_is_a_parse_error() {
        assert!(matches!(
            parse_sidecar("<movie><title>X</title></movie>"),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(parse_sidecar(""), Err(SyncError::Parse(_))));
    }

    #[test]
    fn markup_on_trailing_line_is_a_parse_error() {
        let content = "<?xml version=\"1.0\"?>\n<movie><title>X</title></movie><extra/>";
        assert!(matches!(parse_sidecar(content), Err(SyncError::Parse(_))));
    }

    #[test]
    fn wrong_root_is_a_validation_error() {
        let content = "<?xml version=\"1.0\"?>\n\
             <episode><title>X</title></episode>\n\
             https://www.imdb.com/title/tt0000001\n";
        assert!(matches!(
            parse_sidecar(content),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn missing_title_is_a_validation_error() {
        let content = "<?xml version=\"1.0\"?>\n\
             <movie><playcount>1</playcount></movie>\n\
             https://www.imdb.com/title/tt0000001\n";
        assert!(matches!(
            parse_sidecar(content),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn mixed_content_is_a_parse_error() {
        let content = "<?xml version=\"1.0\"?>\n\
             <movie>loose text<title>X</title></movie>\n\
             https://www.imdb.com/title/tt0000001\n";
        assert!(matches!(parse_sidecar(content), Err(SyncError::Parse(_))));
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read(&dir.path().join(SIDECAR_FILENAME)),
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn canonical_identity_line_is_recognized() {
        assert_eq!(
            parse_identity_line("https://www.imdb.com/title/tt0133093"),
            Some("tt0133093")
        );
        assert_eq!(
            classify_trailing_line("https://www.imdb.com/title/tt0133093"),
            IdentityHint::Found("tt0133093".to_string())
        );
    }

    #[test]
    fn near_miss_identity_shapes_are_reported() {
        for line in [
            "http://imdb.com/title/tt0133093/",
            "https://www.imdb.com/title/tt0133093/",
            "http://www.imdb.com/title/tt0133093",
            "https://imdb.com/title/tt0133093",
            "https://www.imdb.com/title/tt0133093 extra",
            "not a url at all",
        ] {
            assert_eq!(
                classify_trailing_line(line),
                IdentityHint::Unrecognized(line.to_string()),
                "expected {line:?} to be reported"
            );
        }
    }

    #[test]
    fn allow_listed_alternate_links_are_silently_absent() {
        assert_eq!(
            classify_trailing_line("https://www.themoviedb.org/movie/27205-inception"),
            IdentityHint::Absent
        );
        assert_eq!(classify_trailing_line(""), IdentityHint::Absent);
    }

    #[test]
    fn identity_hint_on_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            read_identity_hint(&dir.path().join(SIDECAR_FILENAME)).unwrap(),
            IdentityHint::Absent
        );
    }

    #[test]
    fn xml_escape_covers_all_specials() {
        assert_eq!(xml_escape("a & b"), "a &amp; b");
        assert_eq!(xml_escape("a < b"), "a &lt; b");
        assert_eq!(xml_escape("a > b"), "a &gt; b");
        assert_eq!(xml_escape("a \"b\""), "a &quot;b&quot;");
        assert_eq!(xml_escape("it's"), "it&apos;s");
        assert_eq!(xml_escape("plain"), "plain");
    }
}
