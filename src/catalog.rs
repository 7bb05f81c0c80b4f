use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

const PMCID_PATTERN: &str = r"/articles/(PMC\d+)";

/// One catalog row: the article URL, its PMCID slug, and the listed title.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub url: String,
    pub pmcid: String,
    pub title: String,
}

/// Read a `Title,Link` publication catalog and keep every row whose link
/// carries a PMCID. The first header cell may arrive with a UTF-8 BOM;
/// both spellings are accepted.
pub fn read_catalog(path: &str) -> Result<Vec<CatalogEntry>> {
    let pmcid_re = Regex::new(PMCID_PATTERN)?;
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open catalog {}", path))?;

    let headers = reader.headers()?.clone();
    let title_idx = find_column(&headers, "Title").context("Catalog has no Title column")?;
    let link_idx = find_column(&headers, "Link").context("Catalog has no Link column")?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let url = record.get(link_idx).unwrap_or("").trim();
        if url.is_empty() {
            continue;
        }
        let Some(caps) = pmcid_re.captures(url) else {
            skipped += 1;
            continue;
        };
        entries.push(CatalogEntry {
            url: url.to_string(),
            pmcid: caps[1].to_string(),
            title: record.get(title_idx).unwrap_or("").trim().to_string(),
        });
    }

    info!(
        "Catalog rows: {} with a PMCID link, {} without",
        entries.len(),
        skipped
    );
    Ok(entries)
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_derives_pmcids() {
        let entries = read_catalog("tests/fixtures/catalog.csv").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pmcid, "PMC4136787");
        assert_eq!(
            entries[0].title,
            "Mice in Bion-M 1 Space Mission: Training and Selection"
        );
        assert_eq!(entries[1].pmcid, "PMC3630201");
        assert!(entries[1].title.starts_with("Microgravity induces pelvic bone loss"));
    }

    #[test]
    fn bom_on_the_first_header_is_tolerated() {
        // The fixture carries a real BOM; resolving the Title column at all
        // proves the comparison strips it.
        let entries = read_catalog("tests/fixtures/catalog.csv").unwrap();
        assert!(!entries[0].title.is_empty());
    }

    #[test]
    fn non_pmc_links_and_blank_links_are_dropped() {
        let entries = read_catalog("tests/fixtures/catalog.csv").unwrap();
        assert!(entries.iter().all(|e| e.pmcid.starts_with("PMC")));
        assert!(entries.iter().all(|e| !e.url.is_empty()));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_catalog("tests/fixtures/absent.csv").is_err());
    }
}
