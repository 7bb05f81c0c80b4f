use std::sync::LazyLock;

use regex::Regex;

use crate::parser::dom::{walk_elements, DomNode};
use crate::parser::headings::heading_level;

use super::main_content;

const MAX_AUTHORS: usize = 20;
const MAX_EDITORS: usize = 5;
const TITLE_SCAN_WINDOW: usize = 20;

/// Keywords that mark a heading as a section title rather than a name.
const SECTION_KEYWORDS: &[&str] = &[
    "abstract",
    "introduction",
    "method",
    "result",
    "discussion",
    "conclusion",
    "reference",
    "figure",
    "table",
    "doi",
    "pmc",
    "pubmed",
    "editor",
    "editorial",
    "review",
    "background",
    "objective",
    "data",
    "analysis",
    "findings",
    "implications",
    "limitations",
    "future",
    "summary",
    "acknowledgment",
    "funding",
];

const AFFILIATION_KEYWORDS: &[&str] = &[
    "institute",
    "university",
    "college",
    "center",
    "department",
    "laboratory",
    "hospital",
    "school",
    "academy",
    "research",
];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z\s.]+$").unwrap());
static EDITOR_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)Editor[^:]*:\s*([^.]+)").unwrap(),
        Regex::new(r"(?i)Edited by[^:]*:\s*([^.]+)").unwrap(),
        Regex::new(r"(?i)Editorial[^:]*:\s*([^.]+)").unwrap(),
    ]
});
static EDITOR_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,;]|\sand\s").unwrap());

#[derive(Debug, Default)]
pub struct AuthorInfo {
    pub authors: Vec<String>,
    pub editors: Vec<String>,
}

/// Author and editor detection over a parsed article page.
///
/// PMC markup does not label contributors consistently, so authors are
/// heading-shaped names confirmed by an affiliation-looking sibling, with a
/// second pass near the page title when the main content yields nothing.
/// Editors come from `Editor:` patterns in the page text. Degrades to empty
/// lists rather than failing.
pub fn extract(root: &DomNode) -> AuthorInfo {
    let mut authors = Vec::new();
    if let Some(scope) = main_content(root) {
        heading_candidates(scope, &mut authors);
    }
    if authors.is_empty() {
        title_adjacent_pass(root, &mut authors);
    }
    authors.truncate(MAX_AUTHORS);

    let mut editors = collect_editors(&root.text_content());
    editors.truncate(MAX_EDITORS);

    AuthorInfo { authors, editors }
}

/// Headings inside the main content whose text is name-shaped and whose
/// next element sibling mentions an affiliation.
fn heading_candidates(scope: &DomNode, authors: &mut Vec<String>) {
    walk_elements(scope, &mut |el, following| {
        if heading_level(el).is_none() {
            return;
        }
        let text = el.collapsed_text();
        if looks_like_name(&text) && affiliation_follows(following) && !authors.contains(&text) {
            authors.push(text);
        }
    });
}

/// Fallback: the first twenty siblings after the page `<h1>`, same test.
fn title_adjacent_pass(root: &DomNode, authors: &mut Vec<String>) {
    let mut done = false;
    walk_elements(root, &mut |el, following| {
        if done || el.tag() != Some("h1") {
            return;
        }
        done = true;
        for (i, node) in following.iter().take(TITLE_SCAN_WINDOW).enumerate() {
            if heading_level(node).is_none() {
                continue;
            }
            let text = node.collapsed_text();
            if looks_like_name(&text)
                && affiliation_follows(&following[i + 1..])
                && !authors.contains(&text)
            {
                authors.push(text);
            }
        }
    });
}

fn looks_like_name(text: &str) -> bool {
    let len = text.chars().count();
    if len <= 5 || len >= 100 || !text.contains(' ') || !NAME_RE.is_match(text) {
        return false;
    }
    let lower = text.to_lowercase();
    !SECTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// True when the first element sibling ahead reads like an affiliation line.
fn affiliation_follows(following: &[DomNode]) -> bool {
    let Some(next) = following.iter().find(|n| n.is_element()) else {
        return false;
    };
    let text = next.text_content().to_lowercase();
    AFFILIATION_KEYWORDS.iter().any(|kw| text.contains(kw))
}

fn collect_editors(page_text: &str) -> Vec<String> {
    let mut editors: Vec<String> = Vec::new();
    for re in EDITOR_RES.iter() {
        for caps in re.captures_iter(page_text) {
            for name in EDITOR_SPLIT_RE.split(&caps[1]) {
                let name = name.trim();
                if name.chars().count() > 2 && !editors.iter().any(|e| e == name) {
                    editors.push(name.to_string());
                }
            }
        }
    }
    editors
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::parse_document;

    #[test]
    fn heading_with_affiliation_sibling_is_an_author() {
        let html = "<main>\
                    <h3>Maria Santos Oliveira</h3>\
                    <p>Department of Physiology, State University</p>\
                    <h2>Abstract</h2><p>Body text.</p>\
                    </main>";
        let dom = parse_document(html);
        let info = extract(&dom);
        assert_eq!(info.authors, ["Maria Santos Oliveira"]);
    }

    #[test]
    fn section_keywords_disqualify_a_heading() {
        let html = "<main>\
                    <h2>Data Availability</h2>\
                    <p>Hosted by the university repository.</p>\
                    </main>";
        let dom = parse_document(html);
        assert!(extract(&dom).authors.is_empty());
    }

    #[test]
    fn name_without_affiliation_confirmation_is_dropped() {
        let html = "<main>\
                    <h3>Maria Santos Oliveira</h3>\
                    <p>An unrelated sentence with no markers.</p>\
                    </main>";
        let dom = parse_document(html);
        assert!(extract(&dom).authors.is_empty());
    }

    #[test]
    fn digits_and_punctuation_break_the_name_shape() {
        let html = "<main>\
                    <h3>Section 2.1 Overview</h3>\
                    <p>Institute of Testing</p>\
                    </main>";
        let dom = parse_document(html);
        assert!(extract(&dom).authors.is_empty());
    }

    #[test]
    fn falls_back_to_headings_near_the_page_title() {
        let html = "<body>\
                    <h1>Long Duration Orbital Flight Outcomes</h1>\
                    <h4>Pavel Ivanov Petrov</h4>\
                    <p>Institute of Biomedical Problems</p>\
                    <p>Other front matter.</p>\
                    </body>";
        let dom = parse_document(html);
        let info = extract(&dom);
        assert_eq!(info.authors, ["Pavel Ivanov Petrov"]);
    }

    #[test]
    fn editors_split_on_commas_and_and() {
        let html = "<main><p>Editor: Claire Fontaine, Miguel Torres and Ana Ruiz.</p>\
                    <h2>Abstract</h2><p>Text.</p></main>";
        let dom = parse_document(html);
        let info = extract(&dom);
        assert_eq!(info.editors, ["Claire Fontaine", "Miguel Torres", "Ana Ruiz"]);
    }

    #[test]
    fn short_editor_fragments_are_discarded() {
        let html = "<main><p>Edited by: Li Wei, JQ.</p></main>";
        let dom = parse_document(html);
        let info = extract(&dom);
        assert_eq!(info.editors, ["Li Wei"]);
    }

    #[test]
    fn page_without_contributors_yields_empty_lists() {
        let dom = parse_document("<main><h2>Abstract</h2><p>Only prose.</p></main>");
        let info = extract(&dom);
        assert!(info.authors.is_empty());
        assert!(info.editors.is_empty());
    }
}
