//! TMDB metadata resolver.
//!
//! All calls are sequential and go through one bounded-retry helper: a 429
//! blocks the whole pipeline for a fixed cool-down, the identical call is
//! retried, and past the attempt ceiling the entry fails loudly with
//! `RateLimitExceeded` instead of looping forever.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::normalize::casefold_eq;
use crate::types::{Credits, MetadataRecord};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const LANGUAGE: &str = "fr-FR";
const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 3;
/// How many cast members the creation prompt shows.
const CAST_DISPLAY_COUNT: usize = 5;

pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    id: Option<u64>,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Option<Vec<SearchResult>>,
}

#[derive(Deserialize)]
struct FindResponse {
    movie_results: Option<Vec<SearchResult>>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    id: u64,
    imdb_id: Option<String>,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct CastMember {
    name: Option<String>,
}

#[derive(Deserialize)]
struct CrewMember {
    name: Option<String>,
    job: Option<String>,
}

#[derive(Deserialize)]
struct CreditsResponse {
    cast: Option<Vec<CastMember>>,
    crew: Option<Vec<CrewMember>>,
}

/// `"2010-07-15"` → `2010`. TMDB sometimes returns an empty string.
fn release_year(release_date: Option<&str>) -> Option<i32> {
    release_date?.get(..4)?.parse().ok()
}

/// Strict search-result selection: a result qualifies iff its title or
/// original title equals the query under casefold AND, when a year was
/// supplied, its release year equals it exactly. First qualifying result
/// wins; a plain "first result" fallback is deliberately not done.
fn select_exact_match<'a>(
    results: &'a [SearchResult],
    title: &str,
    year: Option<i32>,
) -> Option<&'a SearchResult> {
    results.iter().find(|r| {
        let title_matches = r.title.as_deref().is_some_and(|t| casefold_eq(t, title))
            || r.original_title
                .as_deref()
                .is_some_and(|t| casefold_eq(t, title));
        let year_matches = match year {
            Some(y) => release_year(r.release_date.as_deref()) == Some(y),
            None => true,
        };
        title_matches && year_matches
    })
}

fn credits_from_response(response: CreditsResponse) -> Credits {
    let cast = response
        .cast
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.name)
        .take(CAST_DISPLAY_COUNT)
        .collect();
    let directors = response
        .crew
        .unwrap_or_default()
        .into_iter()
        .filter(|m| m.job.as_deref() == Some("Director"))
        .filter_map(|m| m.name)
        .collect();
    Credits { cast, directors }
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// GET a TMDB endpoint with bounded rate-limit retry.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{BASE_URL}{path}");
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("api_key", self.api_key.as_str()),
                    ("language", LANGUAGE),
                ])
                .query(query)
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_ATTEMPTS {
                    return Err(SyncError::RateLimitExceeded {
                        attempts: MAX_ATTEMPTS,
                    });
                }
                tracing::warn!(
                    "TMDB rate limited, waiting {}s (attempt {attempt}/{MAX_ATTEMPTS})",
                    RATE_LIMIT_COOLDOWN.as_secs()
                );
                tokio::time::sleep(RATE_LIMIT_COOLDOWN).await;
                continue;
            }

            let response = response.error_for_status()?;
            return Ok(response.json().await?);
        }
        unreachable!("retry loop always returns")
    }

    /// Fast path: canonical identity id → metadata record. The find
    /// response does not echo the IMDb id back, so it is stamped onto the
    /// record here.
    pub async fn resolve_by_identity(&self, imdb_id: &str) -> Result<MetadataRecord> {
        let response: FindResponse = self
            .get_json(
                &format!("/find/{imdb_id}"),
                &[("external_source", "imdb_id".to_string())],
            )
            .await?;

        let result = response
            .movie_results
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::NotFound(format!("no TMDB movie for {imdb_id}")))?;
        let tmdb_id = result
            .id
            .ok_or_else(|| SyncError::NotFound(format!("TMDB result for {imdb_id} has no id")))?;

        Ok(MetadataRecord {
            tmdb_id,
            imdb_id: imdb_id.to_string(),
            title: result.title.unwrap_or_default(),
            original_title: result.original_title.unwrap_or_default(),
            release_year: release_year(result.release_date.as_deref()),
        })
    }

    /// Fallback path: search by title (+year), require an exact match, then
    /// fetch full details. A match whose details lack an IMDb id is
    /// unusable downstream and resolves as `NotFound`.
    pub async fn resolve_by_title_year(&self, title: &str, year: Option<i32>) -> Result<MetadataRecord> {
        let mut query = vec![
            ("query", title.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(y) = year {
            query.push(("year", y.to_string()));
        }
        let response: SearchResponse = self.get_json("/search/movie", &query).await?;
        let results = response.results.unwrap_or_default();

        let matched = select_exact_match(&results, title, year).ok_or_else(|| {
            SyncError::NotFound(format!("no exact TMDB match for {title:?} ({year:?})"))
        })?;
        let tmdb_id = matched
            .id
            .ok_or_else(|| SyncError::NotFound(format!("TMDB result for {title:?} has no id")))?;

        let details: DetailsResponse = self.get_json(&format!("/movie/{tmdb_id}"), &[]).await?;
        let imdb_id = details
            .imdb_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::NotFound(format!("{title:?} has no IMDb id on TMDB")))?;

        Ok(MetadataRecord {
            tmdb_id: details.id,
            imdb_id,
            title: details.title.unwrap_or_default(),
            original_title: details.original_title.unwrap_or_default(),
            release_year: release_year(details.release_date.as_deref()),
        })
    }

    /// Cast and directors for the creation prompt. Cast is truncated to the
    /// display count, crew filtered to the director role.
    pub async fn fetch_credits(&self, tmdb_id: u64) -> Result<Credits> {
        let response: CreditsResponse = self
            .get_json(&format!("/movie/{tmdb_id}/credits"), &[])
            .await?;
        Ok(credits_from_response(response))
    }
}
