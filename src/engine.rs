//! Reconciliation engine: the per-entry state machine.
//!
//! One entry at a time: resolve identity (sidecar hint fast path, title/year
//! search fallback), aggregate watched status, then diff the desired state
//! against the sidecar and apply the minimal idempotent mutations. Anything
//! that cannot be fixed safely — title drift, watched conflicts, stale award
//! tags — becomes a diagnostic instead of a write. Every failure is caught
//! here and converted to a diagnostic; one bad entry never aborts the run.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::awards::AwardIndex;
use crate::error::{Result, SyncError};
use crate::nfo::{self, IdentityHint, SidecarDocument};
use crate::normalize::roughly_equal;
use crate::overrides::OverrideList;
use crate::prompt::Confirm;
use crate::tmdb::TmdbClient;
use crate::types::{Credits, LibraryEntry, MetadataRecord};
use crate::watched::{self, WatchedExport};

/// Terminal state for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sidecar checked and brought up to date.
    Reconciled,
    /// A new sidecar was created after user acceptance.
    Created,
    /// Nothing was done: resolution failed, the sidecar was unreadable, or
    /// the user declined creation.
    Skipped,
}

/// Anything the engine could not (or must not) fix automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No acceptable metadata match for this entry.
    Unresolved(String),
    /// Provider backoff retries exhausted.
    RateLimited(String),
    /// Sidecar unreadable (malformed document or failing validation).
    SidecarUnreadable(String),
    /// Trailing line that is neither canonical nor allow-listed.
    UnrecognizedIdentityLine(String),
    /// Sidecar title disagrees with the resolved or filename title.
    TitleMismatch {
        sidecar: String,
        resolved: String,
        filename: String,
    },
    /// Watched marker present but no source says watched.
    WatchedConflict { imdb_id: String },
    /// Tag names a known award category this movie does not hold.
    StaleTag(String),
    /// Credits could not be fetched for the creation prompt.
    CreditsUnavailable(String),
    /// File read/write failure; the entry's remaining steps were aborted.
    Io(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved(msg) => write!(f, "unresolved: {msg}"),
            Self::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            Self::SidecarUnreadable(msg) => write!(f, "sidecar unreadable: {msg}"),
            Self::UnrecognizedIdentityLine(line) => {
                write!(f, "unrecognized trailing line: {line:?}")
            }
            Self::TitleMismatch {
                sidecar,
                resolved,
                filename,
            } => write!(
                f,
                "title mismatch: sidecar {sidecar:?}, resolved {resolved:?}, file {filename:?}"
            ),
            Self::WatchedConflict { imdb_id } => write!(
                f,
                "watched marker set but no watch source mentions {imdb_id}"
            ),
            Self::StaleTag(tag) => write!(f, "stale award tag {tag:?}"),
            Self::CreditsUnavailable(msg) => write!(f, "credits unavailable: {msg}"),
            Self::Io(msg) => write!(f, "I/O failure: {msg}"),
        }
    }
}

fn diagnostic_from_error(error: SyncError) -> Diagnostic {
    match error {
        SyncError::NotFound(msg) => Diagnostic::Unresolved(msg),
        SyncError::RateLimitExceeded { attempts } => {
            Diagnostic::RateLimited(format!("gave up after {attempts} attempts"))
        }
        SyncError::Parse(msg) | SyncError::Validation(msg) => {
            Diagnostic::SidecarUnreadable(msg)
        }
        SyncError::Io(e) => Diagnostic::Io(e.to_string()),
        SyncError::Http(e) => Diagnostic::Unresolved(e.to_string()),
    }
}

#[derive(Debug)]
pub struct EntryReport {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Required-but-missing and present-but-stale award tags for one identity.
/// Tags that are not award categories at all are left alone.
pub fn tag_diff(
    awards: &AwardIndex,
    imdb_id: &str,
    present: &[String],
) -> (Vec<String>, Vec<String>) {
    let required = awards.categories_for(imdb_id);
    let missing = required
        .iter()
        .filter(|category| !present.contains(*category))
        .cloned()
        .collect();
    let stale = present
        .iter()
        .filter(|tag| awards.is_category(tag) && !awards.holds(tag, imdb_id))
        .cloned()
        .collect();
    (missing, stale)
}

fn sidecar_path(video_path: &Path) -> PathBuf {
    match video_path.parent() {
        Some(dir) => dir.join(nfo::SIDECAR_FILENAME),
        None => PathBuf::from(nfo::SIDECAR_FILENAME),
    }
}

fn creation_prompt(
    entry: &LibraryEntry,
    record: &MetadataRecord,
    credits: &Credits,
    watched: bool,
) -> String {
    let mut prompt = format!(
        "No sidecar for {:?}.\n  {} ({})",
        entry.path.display().to_string(),
        record.title,
        record
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "year unknown".to_string()),
    );
    if let Some(director) = credits.directors.first() {
        prompt.push_str(&format!("\n  Directed by {director}"));
    }
    if !credits.cast.is_empty() {
        prompt.push_str(&format!("\n  With {}", credits.cast.join(", ")));
    }
    prompt.push_str(&format!(
        "\n  Watched: {}\nCreate {}?",
        if watched { "yes" } else { "no" },
        nfo::SIDECAR_FILENAME
    ));
    prompt
}

pub struct Engine<'a, C: Confirm + ?Sized> {
    tmdb: &'a TmdbClient,
    export: &'a WatchedExport,
    overrides: &'a mut OverrideList,
    awards: &'a AwardIndex,
    confirm: &'a mut C,
}

impl<'a, C: Confirm + ?Sized> Engine<'a, C> {
    pub fn new(
        tmdb: &'a TmdbClient,
        export: &'a WatchedExport,
        overrides: &'a mut OverrideList,
        awards: &'a AwardIndex,
        confirm: &'a mut C,
    ) -> Self {
        Self {
            tmdb,
            export,
            overrides,
            awards,
            confirm,
        }
    }

    /// Run one entry to a terminal state. Never returns an error: every
    /// failure becomes a diagnostic on the report.
    pub async fn process_entry(&mut self, entry: &LibraryEntry) -> EntryReport {
        let mut diagnostics = Vec::new();
        let outcome = match self.run_entry(entry, &mut diagnostics).await {
            Ok(outcome) => outcome,
            Err(error) => {
                diagnostics.push(diagnostic_from_error(error));
                Outcome::Skipped
            }
        };
        EntryReport {
            path: entry.path.clone(),
            outcome,
            diagnostics,
        }
    }

    async fn run_entry(
        &mut self,
        entry: &LibraryEntry,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Outcome> {
        let sidecar = sidecar_path(&entry.path);
        let sidecar_exists = sidecar.exists();

        let hint = if sidecar_exists {
            match nfo::read_identity_hint(&sidecar)? {
                IdentityHint::Found(id) => Some(id),
                IdentityHint::Absent => None,
                IdentityHint::Unrecognized(line) => {
                    diagnostics.push(Diagnostic::UnrecognizedIdentityLine(line));
                    None
                }
            }
        } else {
            None
        };

        let record = match hint {
            Some(id) => self.tmdb.resolve_by_identity(&id).await?,
            None => {
                self.tmdb
                    .resolve_by_title_year(&entry.title, Some(entry.year))
                    .await?
            }
        };

        let watched = watched::is_watched(&record, self.export, self.overrides);

        if !sidecar_exists {
            return self
                .offer_creation(entry, &sidecar, &record, watched, diagnostics)
                .await;
        }

        let doc = nfo::read(&sidecar)?;
        self.reconcile_existing(&sidecar, &doc, entry, &record, watched, diagnostics)?;
        Ok(Outcome::Reconciled)
    }

    /// No sidecar yet: show title, year, lead director and top cast, and
    /// create a minimal sidecar on acceptance. Declining creates nothing.
    async fn offer_creation(
        &mut self,
        entry: &LibraryEntry,
        sidecar: &Path,
        record: &MetadataRecord,
        watched: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Outcome> {
        let credits = match self.tmdb.fetch_credits(record.tmdb_id).await {
            Ok(credits) => credits,
            Err(error) => {
                diagnostics.push(Diagnostic::CreditsUnavailable(error.to_string()));
                Credits::default()
            }
        };
        self.create_sidecar(entry, sidecar, record, watched, &credits)
    }

    /// Step 4 of the per-entry flow, network-free: prompt, then create a
    /// minimal sidecar on acceptance. Declining writes nothing.
    fn create_sidecar(
        &mut self,
        entry: &LibraryEntry,
        sidecar: &Path,
        record: &MetadataRecord,
        watched: bool,
        credits: &Credits,
    ) -> Result<Outcome> {
        let prompt = creation_prompt(entry, record, credits, watched);
        if !self.confirm.confirm(&prompt) {
            return Ok(Outcome::Skipped);
        }
        nfo::create(sidecar, &record.title, &record.imdb_id, watched)?;
        Ok(Outcome::Created)
    }

    /// Steps 5–7 of the per-entry flow, network-free: title checks, watched
    /// marker reconciliation, award-tag reconciliation.
    fn reconcile_existing(
        &mut self,
        sidecar: &Path,
        doc: &SidecarDocument,
        entry: &LibraryEntry,
        record: &MetadataRecord,
        watched: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        // Title drift is reported, never auto-corrected.
        if let Some(sidecar_title) = doc.title() {
            if !roughly_equal(sidecar_title, &record.title)
                || !roughly_equal(sidecar_title, &entry.title)
            {
                diagnostics.push(Diagnostic::TitleMismatch {
                    sidecar: sidecar_title.to_string(),
                    resolved: record.title.clone(),
                    filename: entry.title.clone(),
                });
            }
        }

        if doc.watched() && !watched {
            // Conflict: the sidecar is never touched here; the user may
            // grow the override source for future runs instead.
            diagnostics.push(Diagnostic::WatchedConflict {
                imdb_id: record.imdb_id.clone(),
            });
            let prompt = format!(
                "{:?} is marked watched in its sidecar but no watch source mentions it.\n\
                 Add it to the override list?",
                record.title
            );
            if self.confirm.confirm(&prompt) {
                self.overrides.append(&record.title, &record.imdb_id)?;
            }
        } else if !doc.watched() && watched {
            nfo::mark_watched(sidecar)?;
        }

        let present: Vec<String> = doc.tags().iter().map(|t| t.to_string()).collect();
        let (missing, stale) = tag_diff(self.awards, &record.imdb_id, &present);
        for tag in &missing {
            // One mutation per missing tag, each independently persisted.
            nfo::add_tag(sidecar, tag)?;
        }
        for tag in stale {
            diagnostics.push(Diagnostic::StaleTag(tag));
        }
        Ok(())
    }
}
