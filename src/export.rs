use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, CitationRow, PaperExport};
use crate::parser::sections::Section;
use crate::parser::serialize::{self, MAX_CONTENT_LEN};

/// Write every export artifact for the processed papers into `dir`.
pub fn export_all(conn: &Connection, papers: &[PaperExport], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let parsed = parse_papers(papers)?;

    write_papers_json(&parsed, &dir.join("papers.json"))?;
    write_sections_csv(&parsed, &dir.join("sections.csv"))?;
    write_papers_text(&parsed, &dir.join("papers.txt"))?;
    write_authors_csv(&parsed, &dir.join("authors.csv"))?;

    let citations = db::fetch_matched_citations(conn)?;
    if !citations.is_empty() {
        write_citations_csv(&citations, &dir.join("citations.csv"))?;
    }

    write_summary(&parsed, &dir.join("summary.txt"))?;
    Ok(())
}

struct ExportPaper {
    pmcid: String,
    url: String,
    title: String,
    authors: String,
    author_count: i64,
    editors: String,
    editor_count: i64,
    sections: Vec<Section>,
}

fn parse_papers(papers: &[PaperExport]) -> Result<Vec<ExportPaper>> {
    papers
        .iter()
        .map(|p| {
            let sections: Vec<Section> = serde_json::from_str(&p.sections_json)
                .with_context(|| format!("bad sections JSON for {}", p.pmcid))?;
            Ok(ExportPaper {
                pmcid: p.pmcid.clone(),
                url: p.url.clone(),
                title: p.title.clone(),
                authors: p.authors.clone(),
                author_count: p.author_count,
                editors: p.editors.clone(),
                editor_count: p.editor_count,
                sections,
            })
        })
        .collect()
}

// ── papers.json ──

#[derive(Serialize)]
struct PaperDoc<'a> {
    pmcid: &'a str,
    title: &'a str,
    url: &'a str,
    authors: Vec<&'a str>,
    editors: Vec<&'a str>,
    sections: &'a [Section],
}

fn write_papers_json(papers: &[ExportPaper], path: &Path) -> Result<()> {
    let docs: Vec<PaperDoc> = papers
        .iter()
        .map(|p| PaperDoc {
            pmcid: &p.pmcid,
            title: &p.title,
            url: &p.url,
            authors: split_names(&p.authors),
            editors: split_names(&p.editors),
            sections: &p.sections,
        })
        .collect();
    fs::write(path, serde_json::to_string_pretty(&docs)?)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn split_names(joined: &str) -> Vec<&str> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(", ").collect()
    }
}

// ── sections.csv ──

fn write_sections_csv(papers: &[ExportPaper], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "paper_title",
        "paper_url",
        "authors",
        "editors",
        "section_level",
        "section_title",
        "section_content",
        "parent_section",
    ])?;

    for paper in papers {
        let authors = or_not_found(&paper.authors);
        let editors = or_not_found(&paper.editors);

        // Paper metadata row, then one row per section in pre-order
        wtr.write_record([
            paper.title.as_str(),
            paper.url.as_str(),
            authors,
            editors,
            "",
            "",
            "",
            "",
        ])?;

        for row in serialize::flatten(&paper.sections, MAX_CONTENT_LEN) {
            let level = row.level.to_string();
            wtr.write_record([
                paper.title.as_str(),
                paper.url.as_str(),
                authors,
                editors,
                level.as_str(),
                row.title.as_str(),
                row.content.as_str(),
                row.parent_title.as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn or_not_found(s: &str) -> &str {
    if s.is_empty() {
        "Not found"
    } else {
        s
    }
}

// ── papers.txt ──

fn write_papers_text(papers: &[ExportPaper], path: &Path) -> Result<()> {
    let banner = "=".repeat(80);
    let mut out = String::new();
    for (i, paper) in papers.iter().enumerate() {
        out.push_str(&banner);
        out.push('\n');
        out.push_str(&format!("PAPER {}: {}\n", i + 1, paper.title));
        out.push_str(&format!("PMCID: {}\n", paper.pmcid));
        out.push_str(&format!("URL: {}\n", paper.url));
        out.push_str(&format!("AUTHORS: {}\n", or_not_found(&paper.authors)));
        out.push_str(&format!("EDITORS: {}\n", or_not_found(&paper.editors)));
        out.push_str(&banner);
        out.push_str("\n\n");
        out.push_str(&serialize::render_text(&paper.sections));
        out.push_str("\n\n");
    }
    fs::write(path, out)?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── authors.csv ──

fn write_authors_csv(papers: &[ExportPaper], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "paper_title",
        "paper_url",
        "authors",
        "author_count",
        "editors",
        "editor_count",
    ])?;

    for paper in papers {
        let author_count = paper.author_count.to_string();
        let editor_count = paper.editor_count.to_string();
        wtr.write_record([
            paper.title.as_str(),
            paper.url.as_str(),
            or_not_found(&paper.authors),
            author_count.as_str(),
            or_not_found(&paper.editors),
            editor_count.as_str(),
        ])?;
    }

    wtr.flush()?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── citations.csv ──

fn write_citations_csv(citations: &[CitationRow], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "pmcid",
        "original_title",
        "original_url",
        "matched_title",
        "authors",
        "year",
        "venue",
        "citation_count",
        "influential_citation_count",
        "is_open_access",
        "doi",
        "pmid",
        "semantic_url",
        "open_access_pdf_url",
    ])?;

    for c in citations {
        let year = c.year.map(|y| y.to_string()).unwrap_or_default();
        let citation_count = c.citation_count.map(|n| n.to_string()).unwrap_or_default();
        let influential = c
            .influential_citation_count
            .map(|n| n.to_string())
            .unwrap_or_default();
        let open_access = c.is_open_access.map(|b| b.to_string()).unwrap_or_default();
        wtr.write_record([
            c.pmcid.as_str(),
            c.original_title.as_str(),
            c.original_url.as_str(),
            c.matched_title.as_deref().unwrap_or(""),
            c.authors.as_deref().unwrap_or(""),
            year.as_str(),
            c.venue.as_deref().unwrap_or(""),
            citation_count.as_str(),
            influential.as_str(),
            open_access.as_str(),
            c.doi.as_deref().unwrap_or(""),
            c.pmid.as_deref().unwrap_or(""),
            c.semantic_url.as_deref().unwrap_or(""),
            c.open_access_pdf.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── summary.txt ──

fn write_summary(papers: &[ExportPaper], path: &Path) -> Result<()> {
    fs::write(path, summary_report(papers))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn summary_report(papers: &[ExportPaper]) -> String {
    let n = papers.len();
    let top_sections: usize = papers.iter().map(|p| p.sections.len()).sum();
    let all_sections: usize = papers
        .iter()
        .map(|p| serialize::count_nodes(&p.sections))
        .sum();
    let with_authors = papers.iter().filter(|p| p.author_count > 0).count();
    let total_authors: i64 = papers.iter().map(|p| p.author_count).sum();
    let with_editors = papers.iter().filter(|p| p.editor_count > 0).count();
    let total_editors: i64 = papers.iter().map(|p| p.editor_count).sum();

    let mut out = String::new();
    out.push_str("PMC Publication Harvest Summary\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    ));

    out.push_str(&format!("Total papers processed: {}\n", n));
    out.push_str(&format!("Total top-level sections: {}\n", top_sections));
    out.push_str(&format!("Total sections (all levels): {}\n", all_sections));
    out.push_str(&format!(
        "Average sections per paper: {:.1}\n\n",
        average(top_sections as f64, n)
    ));

    out.push_str(&format!("Papers with authors found: {}/{}\n", with_authors, n));
    out.push_str(&format!("Total authors found: {}\n", total_authors));
    out.push_str(&format!(
        "Average authors per paper: {:.1}\n\n",
        average(total_authors as f64, n)
    ));

    out.push_str(&format!("Papers with editors found: {}/{}\n", with_editors, n));
    out.push_str(&format!("Total editors found: {}\n", total_editors));
    out.push_str(&format!(
        "Average editors per paper: {:.1}\n\n",
        average(total_editors as f64, n)
    ));

    out.push_str("Most common section types:\n");
    out.push_str(&"-".repeat(30));
    out.push('\n');
    for (title, count) in top_section_titles(papers, 10) {
        out.push_str(&format!("{}: {} papers\n", title, count));
    }

    out.push('\n');
    out.push_str(&"=".repeat(50));
    out.push('\n');
    out.push_str("Processing completed successfully!\n");
    out
}

fn average(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}

/// Top-level section titles by frequency, lowercased. Ties break alphabetically.
fn top_section_titles(papers: &[ExportPaper], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for paper in papers {
        for section in &paper.sections {
            *counts.entry(section.title.to_lowercase()).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, authors: &str, editors: &str, sections: Vec<Section>) -> ExportPaper {
        ExportPaper {
            pmcid: "PMC1".to_string(),
            url: "https://example.org".to_string(),
            title: title.to_string(),
            authors: authors.to_string(),
            author_count: split_names(authors).len() as i64,
            editors: editors.to_string(),
            editor_count: split_names(editors).len() as i64,
            sections,
        }
    }

    fn section(title: &str) -> Section {
        Section {
            level: 1,
            title: title.to_string(),
            content: String::new(),
            subsections: Vec::new(),
        }
    }

    #[test]
    fn split_names_handles_empty_and_joined() {
        assert!(split_names("").is_empty());
        assert_eq!(split_names("A One"), vec!["A One"]);
        assert_eq!(split_names("A One, B Two"), vec!["A One", "B Two"]);
    }

    #[test]
    fn missing_values_render_as_not_found() {
        assert_eq!(or_not_found(""), "Not found");
        assert_eq!(or_not_found("A One"), "A One");
    }

    #[test]
    fn title_counts_rank_by_frequency_then_name() {
        let papers = vec![
            paper("p1", "", "", vec![section("Introduction"), section("Methods")]),
            paper("p2", "", "", vec![section("introduction"), section("Results")]),
        ];
        let top = top_section_titles(&papers, 10);
        assert_eq!(
            top,
            vec![
                ("introduction".to_string(), 2),
                ("methods".to_string(), 1),
                ("results".to_string(), 1),
            ]
        );
    }

    #[test]
    fn title_counts_respect_the_limit() {
        let papers = vec![paper(
            "p1",
            "",
            "",
            vec![section("A"), section("B"), section("C")],
        )];
        assert_eq!(top_section_titles(&papers, 2).len(), 2);
    }

    #[test]
    fn summary_report_counts_coverage_and_totals() {
        let papers = vec![
            paper("p1", "A One, B Two", "E One", vec![section("Introduction")]),
            paper("p2", "", "", vec![section("Methods"), section("Results")]),
        ];
        let report = summary_report(&papers);
        assert!(report.contains("Total papers processed: 2"));
        assert!(report.contains("Total top-level sections: 3"));
        assert!(report.contains("Papers with authors found: 1/2"));
        assert!(report.contains("Total authors found: 2"));
        assert!(report.contains("Papers with editors found: 1/2"));
        assert!(report.contains("Average sections per paper: 1.5"));
        assert!(report.ends_with("Processing completed successfully!\n"));
    }

    #[test]
    fn summary_report_survives_zero_papers() {
        let report = summary_report(&[]);
        assert!(report.contains("Total papers processed: 0"));
        assert!(report.contains("Average sections per paper: 0.0"));
    }
}
