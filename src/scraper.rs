use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::ScrapeRow;

const CONCURRENCY: usize = 4;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// PMC serves a cut-down page to unknown clients; a browser UA gets the full article.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Scrape stats returned after completion.
pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch article pages concurrently, saving each result to DB as it arrives.
pub async fn scrape_pages_streaming(
    conn: &Connection,
    pages: Vec<(i64, String, String)>,
) -> Result<ScrapeStats> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, main loop saves to DB
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ScrapeRow>(CONCURRENCY * 2);

    // Spawn all fetch tasks
    for (publication_id, url, pmcid) in pages {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let row = scrape_with_retry(&client, publication_id, &url, &pmcid).await;
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    // Receive and save each result immediately
    let mut ok = 0usize;
    let mut errors = 0usize;

    // Prepare statements once, reuse for each row
    let mut insert_stmt = conn.prepare(
        "INSERT INTO page_data (publication_id, url, pmcid, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut update_stmt = conn.prepare(
        "UPDATE publications SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
    )?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }

        // Save immediately
        save_one(&mut insert_stmt, &mut update_stmt, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scraped {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(ScrapeStats { total, ok, errors })
}

/// Save a single scrape result to DB using pre-prepared statements.
fn save_one(
    insert: &mut rusqlite::Statement,
    update: &mut rusqlite::Statement,
    row: &ScrapeRow,
) -> Result<()> {
    insert.execute(rusqlite::params![
        row.publication_id,
        row.url,
        row.pmcid,
        row.html,
        row.status,
        row.error,
        row.latency_ms,
    ])?;
    update.execute(rusqlite::params![row.publication_id])?;
    Ok(())
}

async fn scrape_with_retry(
    client: &reqwest::Client,
    publication_id: i64,
    url: &str,
    pmcid: &str,
) -> ScrapeRow {
    for attempt in 0..=MAX_RETRIES {
        let row = scrape_one(client, publication_id, url, pmcid).await;

        let should_retry = match row.status {
            Some(429) => true,
            Some(s) if s >= 500 => true,
            _ => false,
        };

        if !should_retry || attempt == MAX_RETRIES {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
            row.status.unwrap_or(0),
            pmcid,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    scrape_one(client, publication_id, url, pmcid).await
}

/// Fetch one article page. Failures come back as an error row, never an Err,
/// so the publication is always marked visited.
async fn scrape_one(
    client: &reqwest::Client,
    publication_id: i64,
    url: &str,
    pmcid: &str,
) -> ScrapeRow {
    let start = Instant::now();
    let response = client.get(url).send().await;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            if !resp.status().is_success() {
                return ScrapeRow {
                    publication_id,
                    url: url.to_string(),
                    pmcid: pmcid.to_string(),
                    html: None,
                    status: Some(status),
                    error: Some(format!("HTTP {}", status)),
                    latency_ms: Some(start.elapsed().as_millis() as i64),
                };
            }
            match resp.text().await {
                Ok(html) => ScrapeRow {
                    publication_id,
                    url: url.to_string(),
                    pmcid: pmcid.to_string(),
                    html: Some(html),
                    status: Some(status),
                    error: None,
                    latency_ms: Some(start.elapsed().as_millis() as i64),
                },
                Err(e) => ScrapeRow {
                    publication_id,
                    url: url.to_string(),
                    pmcid: pmcid.to_string(),
                    html: None,
                    status: Some(status),
                    error: Some(e.to_string()),
                    latency_ms: Some(start.elapsed().as_millis() as i64),
                },
            }
        }
        Err(e) => ScrapeRow {
            publication_id,
            url: url.to_string(),
            pmcid: pmcid.to_string(),
            html: None,
            status: e.status().map(|s| s.as_u16() as i32),
            error: Some(e.to_string()),
            latency_ms: Some(start.elapsed().as_millis() as i64),
        },
    }
}
