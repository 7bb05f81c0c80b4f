use super::dom::{walk_elements, DomNode};

/// A heading in document order, with the sibling slice that follows it at
/// its own depth.
#[derive(Debug)]
pub struct HeadingRef<'a> {
    pub level: u8,
    pub title: String,
    pub following: &'a [DomNode],
}

/// Heading level from the tag's numeric suffix: `h1` is 1 through `h6` at 6.
/// Anything else, `hr` and `header` included, is not a heading.
pub fn heading_level(node: &DomNode) -> Option<u8> {
    let suffix = node.tag()?.strip_prefix('h')?;
    match suffix.parse::<u8>() {
        Ok(level) if (1..=6).contains(&level) => Some(level),
        _ => None,
    }
}

/// Every heading under `root`, at any depth, in document order. Nothing is
/// skipped or merged; repeated titles stay separate records.
pub fn scan_headings(root: &DomNode) -> Vec<HeadingRef<'_>> {
    let mut found = Vec::new();
    walk_elements(root, &mut |el, following| {
        if let Some(level) = heading_level(el) {
            found.push(HeadingRef {
                level,
                title: el.collapsed_text(),
                following,
            });
        }
    });
    found
}
