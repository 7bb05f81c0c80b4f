use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::CitationRow;
use crate::scraper::USER_AGENT;

const API_URL: &str = "https://www.semanticscholar.org/api/1/search";
const FIELDS: &str = "title,authors,year,citationCount,influentialCitationCount,isOpenAccess,\
                      openAccessPdf,url,venue,abstract,publicationTypes,publicationDate,externalIds";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const REQUEST_DELAY_MS: u64 = 2000;
const MAX_RETRIES: u32 = 3;
const SIMILARITY_THRESHOLD: f64 = 0.6;

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Title|Paper|Article):\s*").unwrap());

// ── Wire format ──

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<Author>,
    year: Option<i32>,
    #[serde(default)]
    venue: String,
    citation_count: Option<i64>,
    influential_citation_count: Option<i64>,
    is_open_access: Option<bool>,
    open_access_pdf: Option<OpenAccessPdf>,
    #[serde(default)]
    url: String,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
}

// ── Lookup ──

pub struct CitationStats {
    pub searched: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub errors: usize,
}

/// Look up citation metrics for each publication, one query at a time.
///
/// Matches and definite misses are both persisted so re-runs skip them;
/// transport failures are left unsearched and retried next run.
pub async fn lookup_citations(
    conn: &Connection,
    pending: Vec<(String, String, String)>,
) -> Result<CitationStats> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.semanticscholar.org/"));
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;

    let total = pending.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut insert_stmt = conn.prepare(
        "INSERT OR REPLACE INTO citations
         (pmcid, original_title, original_url, matched, matched_title, authors, year, venue,
          citation_count, influential_citation_count, is_open_access, open_access_pdf,
          doi, pmid, semantic_url)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
    )?;

    let mut matched = 0usize;
    let mut unmatched = 0usize;
    let mut errors = 0usize;

    for (i, (pmcid, title, url)) in pending.iter().enumerate() {
        match search_with_retry(&client, title).await {
            Ok(response) => {
                let row = match best_match(&response.data, title) {
                    Some(hit) => {
                        matched += 1;
                        matched_row(pmcid, title, url, hit)
                    }
                    None => {
                        unmatched += 1;
                        miss_row(pmcid, title, url)
                    }
                };
                save_one(&mut insert_stmt, &row)?;
            }
            Err(e) => {
                warn!("Search failed for {}: {}", pmcid, e);
                errors += 1;
            }
        }
        pb.inc(1);

        if i + 1 < total {
            tokio::time::sleep(Duration::from_millis(REQUEST_DELAY_MS)).await;
        }
    }

    pb.finish_and_clear();
    info!(
        "Citation lookup: {} matched, {} unmatched, {} errors",
        matched, unmatched, errors
    );

    Ok(CitationStats {
        searched: total,
        matched,
        unmatched,
        errors,
    })
}

fn save_one(insert: &mut rusqlite::Statement, row: &CitationRow) -> Result<()> {
    insert.execute(rusqlite::params![
        row.pmcid,
        row.original_title,
        row.original_url,
        row.matched,
        row.matched_title,
        row.authors,
        row.year,
        row.venue,
        row.citation_count,
        row.influential_citation_count,
        row.is_open_access,
        row.open_access_pdf,
        row.doi,
        row.pmid,
        row.semantic_url,
    ])?;
    Ok(())
}

fn matched_row(pmcid: &str, title: &str, url: &str, hit: &SearchResult) -> CitationRow {
    CitationRow {
        pmcid: pmcid.to_string(),
        original_title: title.to_string(),
        original_url: url.to_string(),
        matched: true,
        matched_title: Some(hit.title.clone()),
        authors: Some(format_authors(&hit.authors)),
        year: hit.year,
        venue: Some(hit.venue.clone()),
        citation_count: hit.citation_count,
        influential_citation_count: hit.influential_citation_count,
        is_open_access: hit.is_open_access,
        open_access_pdf: hit.open_access_pdf.as_ref().and_then(|p| p.url.clone()),
        doi: hit.external_ids.as_ref().and_then(|e| e.doi.clone()),
        pmid: hit.external_ids.as_ref().and_then(|e| e.pubmed.clone()),
        semantic_url: Some(hit.url.clone()),
    }
}

fn miss_row(pmcid: &str, title: &str, url: &str) -> CitationRow {
    CitationRow {
        pmcid: pmcid.to_string(),
        original_title: title.to_string(),
        original_url: url.to_string(),
        matched: false,
        matched_title: None,
        authors: None,
        year: None,
        venue: None,
        citation_count: None,
        influential_citation_count: None,
        is_open_access: None,
        open_access_pdf: None,
        doi: None,
        pmid: None,
        semantic_url: None,
    }
}

// ── Search ──

async fn search_with_retry(client: &reqwest::Client, title: &str) -> Result<SearchResponse> {
    for attempt in 0..MAX_RETRIES {
        match search_once(client, title).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt + 1 == MAX_RETRIES {
                    return Err(e);
                }
                let backoff = Duration::from_secs(2u64.pow(attempt));
                warn!(
                    "Search error (attempt {}/{}): {}, backing off {}s",
                    attempt + 1,
                    MAX_RETRIES,
                    e,
                    backoff.as_secs()
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }

    search_once(client, title).await
}

async fn search_once(client: &reqwest::Client, title: &str) -> Result<SearchResponse> {
    let query = clean_title(title);
    let body = client
        .get(API_URL)
        .query(&[
            ("query", query.as_str()),
            ("offset", "0"),
            ("limit", "10"),
            ("sort", "relevance"),
            ("year", ""),
            ("fields", FIELDS),
        ])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(serde_json::from_str(&body)?)
}

// ── Matching ──

/// Strip wrapping quotes and `Title:`-style prefixes before querying.
fn clean_title(title: &str) -> String {
    let trimmed = title.trim().trim_matches(|c| c == '"' || c == '\'');
    PREFIX_RE.replace(trimmed, "").to_string()
}

/// Word-set Jaccard similarity between two lowercased titles.
fn similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Best candidate by similarity, only if it clears the threshold.
fn best_match<'a>(results: &'a [SearchResult], original_title: &str) -> Option<&'a SearchResult> {
    let original = clean_title(original_title).to_lowercase();

    let mut best_score = 0.0f64;
    let mut best = None;
    for result in results {
        let score = similarity(&original, &result.title.to_lowercase());
        if score > best_score {
            best_score = score;
            best = Some(result);
        }
    }

    if best_score > SIMILARITY_THRESHOLD {
        best
    } else {
        None
    }
}

fn format_authors(authors: &[Author]) -> String {
    let names: Vec<&str> = authors
        .iter()
        .map(|a| a.name.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    if names.len() <= 3 {
        names.join(", ")
    } else {
        format!("{} et al. ({} authors)", names[..3].join(", "), names.len())
    }
}
