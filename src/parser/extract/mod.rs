pub mod authors;
pub mod references;

use crate::db::{PaperRow, ReferenceRow, SectionRow};
use crate::parser::dom::DomNode;
use crate::parser::sections::{extract_sections, Section};
use crate::parser::serialize::{count_nodes, flatten, MAX_CONTENT_LEN};

pub struct ExtractedData {
    pub paper: PaperRow,
    pub sections: Vec<SectionRow>,
    pub references: Vec<ReferenceRow>,
}

pub fn extract_all(
    pmcid: &str,
    url: &str,
    page_data_id: i64,
    catalog_title: &str,
    dom: &DomNode,
) -> ExtractedData {
    let title = page_title(dom).unwrap_or_else(|| catalog_title.to_string());
    let info = authors::extract(dom);
    let scope = main_content(dom)
        .or_else(|| dom.find(&|n| n.tag() == Some("body")))
        .unwrap_or(dom);
    let sections = extract_sections(scope);
    let reference_titles = references::extract(dom);

    let section_rows = build_section_rows(pmcid, &sections);
    let reference_rows = reference_titles
        .iter()
        .enumerate()
        .map(|(i, title)| ReferenceRow {
            pmcid: pmcid.to_string(),
            position: i as i64,
            title: title.clone(),
        })
        .collect();

    let paper = PaperRow {
        pmcid: pmcid.to_string(),
        page_data_id,
        url: url.to_string(),
        title,
        authors: info.authors.join(", "),
        author_count: info.authors.len() as i64,
        editors: info.editors.join(", "),
        editor_count: info.editors.len() as i64,
        section_count: sections.len() as i64,
        node_count: count_nodes(&sections) as i64,
        reference_count: reference_titles.len() as i64,
        sections_json: serde_json::to_string(&sections).unwrap_or_else(|_| "[]".to_string()),
    };

    ExtractedData {
        paper,
        sections: section_rows,
        references: reference_rows,
    }
}

/// The article body container, PMC layout variants first, else the whole
/// document.
pub(crate) fn main_content(root: &DomNode) -> Option<&DomNode> {
    root.find(&|n| n.tag() == Some("div") && n.has_class("tsec"))
        .or_else(|| root.find(&|n| n.tag() == Some("div") && n.has_class("article")))
        .or_else(|| root.find(&|n| n.tag() == Some("main")))
        .or_else(|| root.find(&|n| n.tag() == Some("article")))
}

/// Page title: the first `<h1>` anywhere, else the `<title>` tag. An empty
/// heading counts as missing so the caller can fall back to catalog data.
fn page_title(root: &DomNode) -> Option<String> {
    root.find(&|n| n.tag() == Some("h1"))
        .or_else(|| root.find(&|n| n.tag() == Some("title")))
        .map(|n| n.collapsed_text())
        .filter(|t| !t.is_empty())
}

fn build_section_rows(pmcid: &str, sections: &[Section]) -> Vec<SectionRow> {
    flatten(sections, MAX_CONTENT_LEN)
        .into_iter()
        .enumerate()
        .map(|(i, row)| SectionRow {
            pmcid: pmcid.to_string(),
            position: i as i64,
            level: row.level as i64,
            title: row.title,
            content: row.content,
            parent_title: row.parent_title,
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::parse_document;

    fn parse(fixture: &str) -> DomNode {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        parse_document(&html)
    }

    #[test]
    fn article_metadata() {
        let dom = parse("article");
        let data = extract_all("PMC4136787", "https://example.test/PMC4136787/", 1, "", &dom);
        assert_eq!(
            data.paper.title,
            "Mice in Bion-M 1 Space Mission: Training and Selection"
        );
        assert_eq!(
            data.paper.authors,
            "Alexander Andreev Andrievskiy, Vladimir Sychev"
        );
        assert_eq!(data.paper.author_count, 2);
        assert_eq!(data.paper.editors, "Claire Fontaine");
        assert_eq!(data.paper.editor_count, 1);
    }

    #[test]
    fn article_section_forest_counts() {
        let dom = parse("article");
        let data = extract_all("PMC4136787", "https://example.test/PMC4136787/", 1, "", &dom);
        // Two author headings plus six article sections at the top, with
        // Methods carrying its two subsections.
        assert_eq!(data.paper.section_count, 8);
        assert_eq!(data.paper.node_count, 10);
        assert_eq!(data.sections.len(), 10);

        let methods_children: Vec<&str> = data
            .sections
            .iter()
            .filter(|s| s.parent_title == "Methods")
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(methods_children, ["Animal training", "Flight hardware"]);
    }

    #[test]
    fn article_sections_json_round_trips() {
        let dom = parse("article");
        let data = extract_all("PMC4136787", "https://example.test/PMC4136787/", 1, "", &dom);
        let forest: Vec<Section> = serde_json::from_str(&data.paper.sections_json).unwrap();
        assert_eq!(count_nodes(&forest) as i64, data.paper.node_count);

        let hardware = &forest
            .iter()
            .find(|s| s.title == "Methods")
            .unwrap()
            .subsections[1];
        assert!(hardware.content.contains("Ground control 45"));
        assert!(hardware.content.contains("[Figure: Habitat module"));
    }

    #[test]
    fn article_references() {
        let dom = parse("article");
        let data = extract_all("PMC4136787", "https://example.test/PMC4136787/", 1, "", &dom);
        assert_eq!(data.paper.reference_count, 4);
        assert_eq!(
            data.references[0].title,
            "Biological satellites of the Bion series"
        );
        assert_eq!(data.references[3].position, 3);
    }

    #[test]
    fn maintenance_page_falls_back_to_title_tag_and_doi() {
        let dom = parse("minimal");
        let data = extract_all("PMC0000001", "https://example.test/PMC0000001/", 2, "", &dom);
        assert_eq!(data.paper.title, "PMC Maintenance");
        assert_eq!(data.paper.section_count, 0);
        assert_eq!(data.paper.sections_json, "[]");
        assert_eq!(data.references.len(), 1);
        assert_eq!(data.references[0].title, "DOI: 10.1089/ast.2013.1038");
    }

    #[test]
    fn catalog_title_backstops_a_page_without_one() {
        let dom = parse_document("<body><p>Bare page.</p></body>");
        let data = extract_all("PMC1", "https://example.test/PMC1/", 3, "Catalog Title", &dom);
        assert_eq!(data.paper.title, "Catalog Title");
    }
}
