use serde::{Deserialize, Serialize};

use super::content::{level_boundary, section_content};
use super::dom::DomNode;
use super::headings::scan_headings;
use super::nest::{nest_by_level, Nested};

/// One heading with its extracted content and the subsections nested below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub level: u8,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub subsections: Vec<Section>,
}

/// Full pipeline over a parsed document: scan the headings in order, pull
/// each one's sibling content up to its boundary, then rebuild the
/// hierarchy from the flat level sequence. A page without headings yields
/// an empty forest.
pub fn extract_sections(root: &DomNode) -> Vec<Section> {
    let records = scan_headings(root).into_iter().map(|h| {
        let content = section_content(h.following, level_boundary(h.level));
        (h.level, (h.title, content))
    });
    nest_by_level(records).into_iter().map(into_section).collect()
}

fn into_section(node: Nested<(String, String)>) -> Section {
    let (title, content) = node.item;
    Section {
        level: node.level,
        title,
        content,
        subsections: node.children.into_iter().map(into_section).collect(),
    }
}

// ── Tests ──
