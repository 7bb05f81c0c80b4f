use super::dom::DomNode;
use super::headings::heading_level;
use super::normalize::normalize;

/// Classification for a sibling block. Closed set, so a new kind forces
/// every dispatch site through the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    List,
    Table,
    Figure,
    Other,
}

pub fn classify(node: &DomNode) -> ContentKind {
    match node.tag() {
        Some("p" | "div" | "span") => ContentKind::Text,
        Some("ul" | "ol") => ContentKind::List,
        Some("table") => ContentKind::Table,
        Some("figure" | "fig") => ContentKind::Figure,
        _ => ContentKind::Other,
    }
}

/// Default boundary rule: a section's region ends at the first sibling
/// heading at the same or a shallower level. Deeper headings stay inside.
pub fn level_boundary(level: u8) -> impl Fn(&DomNode) -> bool {
    move |node| heading_level(node).is_some_and(|l| l <= level)
}

/// Walk a heading's following siblings until `stop` fires, extracting each
/// block by kind. Sibling headings short of the boundary open their own
/// sections and are not treated as content here. Fragments join with a
/// blank line and the result is normalized.
pub fn section_content<F>(following: &[DomNode], stop: F) -> String
where
    F: Fn(&DomNode) -> bool,
{
    let mut fragments = Vec::new();
    for node in following.iter().filter(|n| n.is_element()) {
        if stop(node) {
            break;
        }
        if heading_level(node).is_some() {
            continue;
        }
        let text = extract_block(node);
        if !text.trim().is_empty() {
            fragments.push(text);
        }
    }
    normalize(&fragments.join("\n\n"))
}

/// One block's text by kind. Total: empty cells and items come out as empty
/// strings, unrecognized tags fall back to plain text.
pub fn extract_block(node: &DomNode) -> String {
    match classify(node) {
        ContentKind::Text | ContentKind::Other => node.collapsed_text(),
        ContentKind::List => extract_list(node),
        ContentKind::Table => extract_table(node),
        ContentKind::Figure => extract_figure(node),
    }
}

fn extract_list(list: &DomNode) -> String {
    let mut items = Vec::new();
    list.find_all(&["li"], &mut items);
    items
        .iter()
        .map(|li| format!("• {}", li.collapsed_text()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_table(table: &DomNode) -> String {
    let mut trs = Vec::new();
    table.find_all(&["tr"], &mut trs);
    let mut rows = Vec::new();
    for tr in trs {
        let mut cells = Vec::new();
        tr.find_all(&["td", "th"], &mut cells);
        if cells.is_empty() {
            continue;
        }
        let joined = cells
            .iter()
            .map(|c| c.collapsed_text())
            .collect::<Vec<_>>()
            .join(" | ");
        rows.push(joined);
    }
    rows.join("\n")
}

fn extract_figure(figure: &DomNode) -> String {
    let caption = figure
        .find(&|n| n.tag() == Some("figcaption"))
        .or_else(|| figure.find(&|n| n.tag() == Some("caption")));
    match caption {
        Some(c) => format!("[Figure: {}]", c.collapsed_text()),
        None => "[Figure]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::parse_document;
    use crate::parser::headings::scan_headings;

    fn first_block(html: &str) -> String {
        let dom = parse_document(html);
        let body = dom.find(&|n| n.tag() == Some("body")).unwrap();
        extract_block(&body.children()[0])
    }

    #[test]
    fn classify_covers_the_known_tags() {
        let dom = parse_document("<p>a</p><ol><li>b</li></ol><table></table><figure></figure><blockquote>c</blockquote>");
        let body = dom.find(&|n| n.tag() == Some("body")).unwrap();
        let kinds: Vec<_> = body
            .children()
            .iter()
            .filter(|n| n.is_element())
            .map(classify)
            .collect();
        assert_eq!(
            kinds,
            [
                ContentKind::Text,
                ContentKind::List,
                ContentKind::Table,
                ContentKind::Figure,
                ContentKind::Other,
            ]
        );
    }

    #[test]
    fn table_rows_join_cells_with_pipes() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
        assert_eq!(first_block(html), "a | b\nc | d");
    }

    #[test]
    fn table_skips_rows_without_cells_and_keeps_empty_cells() {
        let html = "<table><tr></tr><tr><td>x</td><td></td></tr></table>";
        assert_eq!(first_block(html), "x | ");
    }

    #[test]
    fn list_items_get_bullets() {
        let html = "<ul><li>first</li><li>second</li></ul>";
        assert_eq!(first_block(html), "• first\n• second");
    }

    #[test]
    fn figure_uses_caption_when_present() {
        assert_eq!(
            first_block("<figure><figcaption>Orbit diagram</figcaption></figure>"),
            "[Figure: Orbit diagram]"
        );
        assert_eq!(first_block("<figure><img src=\"x.png\"></figure>"), "[Figure]");
    }

    #[test]
    fn unrecognized_tags_fall_back_to_text() {
        assert_eq!(first_block("<blockquote>quoted words</blockquote>"), "quoted words");
    }

    #[test]
    fn region_stops_at_same_level_heading() {
        let dom = parse_document(
            "<h2>First</h2><p>mine</p><h2>Second</h2><p>not mine</p>",
        );
        let headings = scan_headings(&dom);
        let content = section_content(headings[0].following, level_boundary(headings[0].level));
        assert_eq!(content, "mine");
    }

    #[test]
    fn deeper_heading_does_not_stop_the_region() {
        let dom = parse_document(
            "<h2>First</h2><p>one</p><h3>Sub</h3><p>two</p><h2>Second</h2><p>other</p>",
        );
        let headings = scan_headings(&dom);
        let content = section_content(headings[0].following, level_boundary(headings[0].level));
        // The subsection's paragraphs belong to the region; its title does not.
        assert_eq!(content, "one two");
    }

    #[test]
    fn heading_inside_a_container_is_plain_content() {
        let dom = parse_document(
            "<h2>First</h2><p>one</p><div><h2>Trapped</h2><p>deep</p></div>\
             <p>two</p><h2>Second</h2><p>other</p>",
        );
        let headings = scan_headings(&dom);
        let content = section_content(headings[0].following, level_boundary(headings[0].level));
        // Boundary checks siblings only; the wrapped h2 is just the div's text.
        assert_eq!(content, "one Trapped deep two");
    }

    #[test]
    fn no_boundary_extracts_the_whole_tail() {
        let dom = parse_document("<h2>Only</h2><p>a</p><h2>More</h2><p>b</p>");
        let headings = scan_headings(&dom);
        let content = section_content(headings[0].following, |_| false);
        assert_eq!(content, "a b");
    }

    #[test]
    fn empty_region_is_an_empty_string() {
        let dom = parse_document("<h2>Bare</h2><h2>Next</h2>");
        let headings = scan_headings(&dom);
        let content = section_content(headings[0].following, level_boundary(2));
        assert_eq!(content, "");
    }
}
