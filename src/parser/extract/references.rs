use std::sync::LazyLock;

use regex::Regex;

use crate::parser::dom::{walk_elements, DomNode};
use crate::parser::headings::heading_level;

const MAX_REFERENCES: usize = 100;
const MAX_DOI_FALLBACK: usize = 20;
const MIN_ITEM_LEN: usize = 20;

static REF_HEADING_RES: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)references?").unwrap(),
        Regex::new(r"(?i)literature\s+cited").unwrap(),
        Regex::new(r"(?i)bibliography").unwrap(),
        Regex::new(r"(?i)works\s+cited").unwrap(),
        Regex::new(r"(?i)cited\s+references?").unwrap(),
    ]
});
static QUOTED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[“”]([^“”]+)[“”]").unwrap());
static AUTHOR_TITLE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][^.]*\.\s*([^.]+\.)\s*\d{4}").unwrap());
static CAPITALIZED_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+){2,})").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DOI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)doi[:\s]*([^\s,]+)").unwrap());

/// Reference titles in document order, deduplicated and capped. Looks for a
/// references heading, takes the first list-like container after it, and
/// distills a title from each item. A page without any structured reference
/// section falls back to DOI patterns in the raw text.
pub fn extract(root: &DomNode) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();

    if let Some(container) = references_container(root) {
        let mut items = Vec::new();
        container.find_all(&["li", "p", "div"], &mut items);
        for item in items {
            let raw = item.text_content();
            let raw = raw.trim();
            if raw.chars().count() <= MIN_ITEM_LEN {
                continue;
            }
            let text = WHITESPACE_RE.replace_all(raw, " ");
            let title = distill_title(&text);
            if !title.is_empty() && !titles.iter().any(|t| t == &title) {
                titles.push(title);
            }
        }
    }

    if titles.is_empty() {
        for caps in DOI_RE
            .captures_iter(&root.text_content())
            .take(MAX_DOI_FALLBACK)
        {
            titles.push(format!("DOI: {}", &caps[1]));
        }
    }

    titles.truncate(MAX_REFERENCES);
    titles
}

/// First sibling container (div, section, ol, ul) after a heading that
/// matches one of the reference keywords, tried in keyword order.
fn references_container(root: &DomNode) -> Option<&DomNode> {
    let mut headings: Vec<(String, &[DomNode])> = Vec::new();
    walk_elements(root, &mut |el, following| {
        if heading_level(el).is_some() {
            headings.push((el.collapsed_text(), following));
        }
    });

    for re in REF_HEADING_RES.iter() {
        if let Some((_, following)) = headings.iter().find(|(title, _)| re.is_match(title)) {
            return following
                .iter()
                .find(|n| matches!(n.tag(), Some("div" | "section" | "ol" | "ul")));
        }
    }
    None
}

/// Title from one raw reference string: a quoted span, then the
/// `Authors. Title. Year` shape, then a run of capitalized words, then the
/// first hundred characters.
fn distill_title(text: &str) -> String {
    if let Some(caps) = QUOTED_TITLE_RE.captures(text) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = AUTHOR_TITLE_YEAR_RE.captures(text) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = CAPITALIZED_RUN_RE.captures(text) {
        return caps[1].trim().to_string();
    }
    text.chars().take(100).collect::<String>().trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::parse_document;

    #[test]
    fn quoted_span_wins() {
        let title = distill_title(
            "Gazenko OG, Ilyin EA. “Biological satellites of the Bion series” Kosm Biol 1987",
        );
        assert_eq!(title, "Biological satellites of the Bion series");
    }

    #[test]
    fn author_title_year_shape_is_second_choice() {
        let title = distill_title(
            "Ilyin EA, Novikov VE. Stands for simulating weightlessness in rat experiments. 1980",
        );
        assert_eq!(title, "Stands for simulating weightlessness in rat experiments.");
    }

    #[test]
    fn capitalized_run_is_third_choice() {
        let title = distill_title(
            "measurements collected aboard the Advanced Biological Research Facility during long missions",
        );
        assert_eq!(title, "Advanced Biological Research Facility");
    }

    #[test]
    fn first_hundred_chars_are_the_last_resort() {
        let text = "a lowercase reference string with no recognizable structure that simply runs on and on well past the hundred character cut point";
        let title = distill_title(text);
        assert_eq!(title.chars().count(), 100);
        assert!(text.starts_with(&title));
    }

    #[test]
    fn list_after_references_heading_is_harvested_in_order() {
        let html = "<main>\
                    <h2>Results</h2><p>Findings here.</p>\
                    <h2>References</h2>\
                    <ol>\
                    <li>Gazenko OG. “Biological satellites of the Bion series” Kosm Biol 1987</li>\
                    <li>Ilyin EA, Novikov VE. Stands for simulating weightlessness in rat experiments. 1980</li>\
                    <li>too short</li>\
                    </ol>\
                    </main>";
        let dom = parse_document(html);
        let titles = extract(&dom);
        assert_eq!(
            titles,
            [
                "Biological satellites of the Bion series",
                "Stands for simulating weightlessness in rat experiments.",
            ]
        );
    }

    #[test]
    fn duplicate_items_collapse() {
        let html = "<h2>References</h2><ul>\
                    <li>Gazenko OG. “Biological satellites of the Bion series” Kosm Biol 1987</li>\
                    <li>Gazenko OG. “Biological satellites of the Bion series” Kosm Biol 1987</li>\
                    </ul>";
        let dom = parse_document(html);
        assert_eq!(extract(&dom).len(), 1);
    }

    #[test]
    fn heading_without_a_following_container_finds_nothing_structured() {
        let html = "<h2>References</h2><p>See the printed edition for the full list of sources.</p>";
        let dom = parse_document(html);
        // No div/section/ol/ul after the heading and no DOI text either.
        assert!(extract(&dom).is_empty());
    }

    #[test]
    fn doi_fallback_when_no_reference_section_exists() {
        let html = "<p>Further reading is indexed under doi:10.1089/ast.2013.1038 in the archive.</p>";
        let dom = parse_document(html);
        assert_eq!(extract(&dom), ["DOI: 10.1089/ast.2013.1038"]);
    }

    #[test]
    fn reference_count_is_capped() {
        let mut items = String::new();
        for i in 0..130 {
            items.push_str(&format!(
                "<li>entirely lowercase reference body number {:03} padded out beyond the length floor</li>",
                i
            ));
        }
        let html = format!("<h2>References</h2><ol>{}</ol>", items);
        let dom = parse_document(&html);
        assert_eq!(extract(&dom).len(), MAX_REFERENCES);
    }
}
