use anyhow::Result;
use rusqlite::Connection;

use crate::catalog::CatalogEntry;

const DB_PATH: &str = "data/pmc.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS publications (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            pmcid      TEXT NOT NULL,
            title      TEXT NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_publications_visited ON publications(visited);
        CREATE INDEX IF NOT EXISTS idx_publications_pmcid ON publications(pmcid);

        CREATE TABLE IF NOT EXISTS page_data (
            id             INTEGER PRIMARY KEY,
            publication_id INTEGER NOT NULL REFERENCES publications(id),
            url            TEXT NOT NULL,
            pmcid          TEXT NOT NULL,
            html           TEXT,
            status         INTEGER,
            error          TEXT,
            latency_ms     INTEGER,
            scraped_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_pmcid ON page_data(pmcid);

        -- Extracted structured data
        CREATE TABLE IF NOT EXISTS papers (
            pmcid           TEXT PRIMARY KEY,
            page_id         INTEGER NOT NULL REFERENCES page_data(id),
            url             TEXT NOT NULL,
            title           TEXT,
            authors         TEXT,
            author_count    INTEGER NOT NULL DEFAULT 0,
            editors         TEXT,
            editor_count    INTEGER NOT NULL DEFAULT 0,
            section_count   INTEGER NOT NULL DEFAULT 0,
            node_count      INTEGER NOT NULL DEFAULT 0,
            reference_count INTEGER NOT NULL DEFAULT 0,
            sections_json   TEXT NOT NULL DEFAULT '[]',
            processed_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sections (
            id           INTEGER PRIMARY KEY,
            pmcid        TEXT NOT NULL REFERENCES papers(pmcid),
            position     INTEGER NOT NULL,
            level        INTEGER NOT NULL,
            title        TEXT NOT NULL,
            content      TEXT,
            parent_title TEXT,
            UNIQUE(pmcid, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_pmcid ON sections(pmcid);

        CREATE TABLE IF NOT EXISTS paper_references (
            id       INTEGER PRIMARY KEY,
            pmcid    TEXT NOT NULL REFERENCES papers(pmcid),
            position INTEGER NOT NULL,
            title    TEXT NOT NULL,
            UNIQUE(pmcid, position)
        );
        CREATE INDEX IF NOT EXISTS idx_references_pmcid ON paper_references(pmcid);

        CREATE TABLE IF NOT EXISTS citations (
            pmcid                      TEXT PRIMARY KEY,
            original_title             TEXT NOT NULL,
            original_url               TEXT NOT NULL,
            matched                    BOOLEAN NOT NULL DEFAULT 0,
            matched_title              TEXT,
            authors                    TEXT,
            year                       INTEGER,
            venue                      TEXT,
            citation_count             INTEGER,
            influential_citation_count INTEGER,
            is_open_access             BOOLEAN,
            open_access_pdf            TEXT,
            doi                        TEXT,
            pmid                       TEXT,
            semantic_url               TEXT,
            searched_at                TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Scraping ──

pub fn insert_publications(conn: &Connection, entries: &[CatalogEntry]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO publications (url, pmcid, title) VALUES (?1, ?2, ?3)",
        )?;
        for entry in entries {
            count += stmt.execute(rusqlite::params![entry.url, entry.pmcid, entry.title])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(
    conn: &Connection,
    limit: Option<usize>,
) -> Result<Vec<(i64, String, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, url, pmcid FROM publications WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, url, pmcid FROM publications WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ScrapeRow {
    pub publication_id: i64,
    pub url: String,
    pub pmcid: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

// ── Processing ──

pub struct ScrapedPage {
    pub page_data_id: i64,
    pub pmcid: String,
    pub url: String,
    pub catalog_title: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedPage>> {
    let sql = format!(
        "SELECT pd.id, pd.pmcid, pd.url, pub.title, pd.html
         FROM page_data pd
         JOIN publications pub ON pub.id = pd.publication_id
         LEFT JOIN papers p ON p.pmcid = pd.pmcid
         WHERE pd.html IS NOT NULL AND p.pmcid IS NULL
         ORDER BY pd.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedPage {
                page_data_id: row.get(0)?,
                pmcid: row.get(1)?,
                url: row.get(2)?,
                catalog_title: row.get(3)?,
                html: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Extracted data ──

pub struct PaperRow {
    pub pmcid: String,
    pub page_data_id: i64,
    pub url: String,
    pub title: String,
    pub authors: String,
    pub author_count: i64,
    pub editors: String,
    pub editor_count: i64,
    pub section_count: i64,
    pub node_count: i64,
    pub reference_count: i64,
    pub sections_json: String,
}

pub struct SectionRow {
    pub pmcid: String,
    pub position: i64,
    pub level: i64,
    pub title: String,
    pub content: String,
    pub parent_title: String,
}

pub struct ReferenceRow {
    pub pmcid: String,
    pub position: i64,
    pub title: String,
}

pub fn save_extracted(
    conn: &Connection,
    papers: &[PaperRow],
    sections: &[SectionRow],
    references: &[ReferenceRow],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut p_stmt = tx.prepare(
            "INSERT OR REPLACE INTO papers
             (pmcid, page_id, url, title, authors, author_count, editors, editor_count,
              section_count, node_count, reference_count, sections_json)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        )?;
        let mut del_s = tx.prepare("DELETE FROM sections WHERE pmcid = ?1")?;
        let mut del_r = tx.prepare("DELETE FROM paper_references WHERE pmcid = ?1")?;
        for p in papers {
            p_stmt.execute(rusqlite::params![
                p.pmcid,
                p.page_data_id,
                p.url,
                p.title,
                p.authors,
                p.author_count,
                p.editors,
                p.editor_count,
                p.section_count,
                p.node_count,
                p.reference_count,
                p.sections_json,
            ])?;
            del_s.execute(rusqlite::params![p.pmcid])?;
            del_r.execute(rusqlite::params![p.pmcid])?;
        }

        let mut s_stmt = tx.prepare(
            "INSERT INTO sections (pmcid, position, level, title, content, parent_title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for s in sections {
            s_stmt.execute(rusqlite::params![
                s.pmcid, s.position, s.level, s.title, s.content, s.parent_title,
            ])?;
        }

        let mut r_stmt = tx.prepare(
            "INSERT INTO paper_references (pmcid, position, title) VALUES (?1, ?2, ?3)",
        )?;
        for r in references {
            r_stmt.execute(rusqlite::params![r.pmcid, r.position, r.title])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Citations ──

pub struct CitationRow {
    pub pmcid: String,
    pub original_title: String,
    pub original_url: String,
    pub matched: bool,
    pub matched_title: Option<String>,
    pub authors: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: Option<i64>,
    pub influential_citation_count: Option<i64>,
    pub is_open_access: Option<bool>,
    pub open_access_pdf: Option<String>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub semantic_url: Option<String>,
}

/// Catalog entries that have never been searched, in catalog order.
pub fn fetch_unsearched(
    conn: &Connection,
    limit: Option<usize>,
) -> Result<Vec<(String, String, String)>> {
    let sql = format!(
        "SELECT p.pmcid, p.title, p.url
         FROM publications p
         LEFT JOIN citations c ON c.pmcid = p.pmcid
         WHERE c.pmcid IS NULL
         ORDER BY p.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_matched_citations(conn: &Connection) -> Result<Vec<CitationRow>> {
    let mut stmt = conn.prepare(
        "SELECT pmcid, original_title, original_url, matched, matched_title, authors,
                year, venue, citation_count, influential_citation_count, is_open_access,
                open_access_pdf, doi, pmid, semantic_url
         FROM citations
         WHERE matched = 1
         ORDER BY pmcid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CitationRow {
                pmcid: row.get(0)?,
                original_title: row.get(1)?,
                original_url: row.get(2)?,
                matched: row.get(3)?,
                matched_title: row.get(4)?,
                authors: row.get(5)?,
                year: row.get(6)?,
                venue: row.get(7)?,
                citation_count: row.get(8)?,
                influential_citation_count: row.get(9)?,
                is_open_access: row.get(10)?,
                open_access_pdf: row.get(11)?,
                doi: row.get(12)?,
                pmid: row.get(13)?,
                semantic_url: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Export ──

pub struct PaperExport {
    pub pmcid: String,
    pub url: String,
    pub title: String,
    pub authors: String,
    pub author_count: i64,
    pub editors: String,
    pub editor_count: i64,
    pub section_count: i64,
    pub node_count: i64,
    pub reference_count: i64,
    pub sections_json: String,
}

pub fn fetch_papers(conn: &Connection) -> Result<Vec<PaperExport>> {
    let mut stmt = conn.prepare(
        "SELECT pmcid, url, COALESCE(title,''), COALESCE(authors,''), author_count,
                COALESCE(editors,''), editor_count, section_count, node_count,
                reference_count, sections_json
         FROM papers
         ORDER BY pmcid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PaperExport {
                pmcid: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                authors: row.get(3)?,
                author_count: row.get(4)?,
                editors: row.get(5)?,
                editor_count: row.get(6)?,
                section_count: row.get(7)?,
                node_count: row.get(8)?,
                reference_count: row.get(9)?,
                sections_json: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct OverviewRow {
    pub pmcid: String,
    pub title: String,
    pub section_count: i64,
    pub node_count: i64,
    pub author_count: i64,
    pub reference_count: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    with_authors: bool,
    title: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if with_authors {
        conditions.push("author_count > 0".to_string());
    }
    if let Some(t) = title {
        conditions.push(format!("title LIKE ?{}", params.len() + 1));
        params.push(Box::new(format!("%{}%", t)));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT pmcid, COALESCE(title,''), section_count, node_count,
                author_count, reference_count
         FROM papers{}
         ORDER BY node_count DESC, pmcid
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                pmcid: row.get(0)?,
                title: row.get(1)?,
                section_count: row.get(2)?,
                node_count: row.get(3)?,
                author_count: row.get(4)?,
                reference_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub errors: usize,
    pub processed: usize,
    pub cited: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM publications", [], |r| r.get(0))?;
    let visited: usize = conn.query_row(
        "SELECT COUNT(*) FROM publications WHERE visited = 1",
        [],
        |r| r.get(0),
    )?;
    let scraped: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let processed: usize = conn.query_row("SELECT COUNT(*) FROM papers", [], |r| r.get(0))?;
    let cited: usize = conn.query_row(
        "SELECT COUNT(*) FROM citations WHERE matched = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped,
        errors,
        processed,
        cited,
    })
}
