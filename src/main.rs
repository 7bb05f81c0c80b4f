mod catalog;
mod citations;
mod db;
mod export;
mod parser;
mod scraper;

use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pmc_scraper", about = "PMC publication scraper and section extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the publication catalog CSV and populate the URL queue
    Init {
        /// Path to the catalog CSV (Title, Link columns)
        #[arg(long, default_value = "SB_publication_PMC.csv")]
        catalog: String,
    },
    /// Fetch unvisited article pages
    Scrape {
        /// Max pages to scrape (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract sections, authors and references from scraped HTML
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one pipeline
    Run {
        /// Max pages to scrape+process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Look up citation metrics for catalog publications
    Citations {
        /// Max publications to search (default: all unsearched)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Write JSON/CSV/text exports for processed papers
    Export {
        /// Output directory
        #[arg(long, default_value = "exports")]
        dir: String,
    },
    /// Processed papers overview table
    Overview {
        /// Only papers with extracted authors
        #[arg(long)]
        with_authors: bool,
        /// Filter by title substring
        #[arg(short, long)]
        title: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { catalog } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let entries = catalog::read_catalog(&catalog)?;
            let inserted = db::insert_publications(&conn, &entries)?;
            println!(
                "Inserted {} new publications ({} total in catalog)",
                inserted,
                entries.len()
            );
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited publications. Run 'init' first or all pages are scraped.");
                return Ok(());
            }
            println!("Scraping {} pages (streaming to DB)...", pages.len());
            let stats = scraper::scrape_pages_streaming(&conn, pages).await?;
            println!(
                "Done: {} scraped ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited publications. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Scrape (streaming to DB)
            let t_scrape = Instant::now();
            println!("Pipeline: scraping {} pages (streaming to DB)...", pages.len());
            let stats = scraper::scrape_pages_streaming(&conn, pages).await?;
            println!(
                "Scraped {} pages ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_scrape.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let t_process = Instant::now();
            let unprocessed = db::fetch_unprocessed(&conn, None)?;
            if unprocessed.is_empty() {
                println!("Nothing to process (all scraped pages had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", unprocessed.len());
            let counts = process_pages(&conn, &unprocessed)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Citations { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pending = db::fetch_unsearched(&conn, limit)?;
            if pending.is_empty() {
                println!("No publications waiting for citation lookup.");
                return Ok(());
            }
            println!("Looking up citations for {} publications...", pending.len());
            let stats = citations::lookup_citations(&conn, pending).await?;
            println!(
                "Done: {} searched ({} matched, {} unmatched, {} errors).",
                stats.searched, stats.matched, stats.unmatched, stats.errors
            );
            Ok(())
        }
        Commands::Export { dir } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let papers = db::fetch_papers(&conn)?;
            if papers.is_empty() {
                println!("No processed papers to export. Run 'process' first.");
                return Ok(());
            }
            println!("Exporting {} papers to {}/...", papers.len(), dir);
            export::export_all(&conn, &papers, std::path::Path::new(&dir))?;
            Ok(())
        }
        Commands::Overview {
            with_authors,
            title,
            limit,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, with_authors, title.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No papers found.");
                return Ok(());
            }

            // Compact, readable table
            println!(
                "{:>3} | {:<12} | {:<44} | {:>5} | {:>5} | {:>5} | {:>4}",
                "#", "PMCID", "Title", "Sects", "Nodes", "Auths", "Refs"
            );
            println!("{}", "-".repeat(96));

            for (i, r) in rows.iter().enumerate() {
                let title = truncate(&r.title, 44);
                println!(
                    "{:>3} | {:<12} | {:<44} | {:>5} | {:>5} | {:>5} | {:>4}",
                    i + 1,
                    r.pmcid,
                    title,
                    r.section_count,
                    r.node_count,
                    r.author_count,
                    r.reference_count
                );
            }

            println!("\n{} papers", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:     {}", s.total);
            println!("Visited:   {}", s.visited);
            println!("Unvisited: {}", s.unvisited);
            println!("Scraped:   {}", s.scraped);
            println!("Errors:    {}", s.errors);
            println!("Processed: {}", s.processed);
            println!("Cited:     {}", s.cited);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    papers: usize,
    sections: usize,
    references: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} papers, {} sections, {} references.",
            self.papers, self.sections, self.references,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::ScrapedPage],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        papers: 0,
        sections: 0,
        references: 0,
    };

    for chunk in pages.chunks(200) {
        let results: Vec<_> = chunk.par_iter().map(parser::process_page).collect();

        let mut papers = Vec::new();
        let mut sections = Vec::new();
        let mut references = Vec::new();

        for data in results {
            counts.sections += data.sections.len();
            counts.references += data.references.len();
            papers.push(data.paper);
            sections.extend(data.sections);
            references.extend(data.references);
        }

        counts.papers += papers.len();
        db::save_extracted(conn, &papers, &sections, &references)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
