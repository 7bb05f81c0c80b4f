use super::sections::Section;

/// Char cap for flattened-row content.
pub const MAX_CONTENT_LEN: usize = 1000;
const INDENT_UNIT: &str = "  ";

/// One pre-order row per section.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub level: u8,
    pub title: String,
    pub content: String,
    pub parent_title: String,
}

/// Flatten a forest into pre-order rows. Top-level rows carry an empty
/// parent title; every other row names its direct parent. Content longer
/// than `max_len` chars is cut with a trailing `...`.
pub fn flatten(sections: &[Section], max_len: usize) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for section in sections {
        flatten_into(section, "", max_len, &mut rows);
    }
    rows
}

fn flatten_into(section: &Section, parent: &str, max_len: usize, rows: &mut Vec<FlatRow>) {
    rows.push(FlatRow {
        level: section.level,
        title: section.title.clone(),
        content: truncate_content(&section.content, max_len),
        parent_title: parent.to_string(),
    });
    for sub in &section.subsections {
        flatten_into(sub, &section.title, max_len, rows);
    }
}

/// Char-based cut so a multi-byte character never splits.
pub fn truncate_content(content: &str, max: usize) -> String {
    if content.chars().count() <= max {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Indented plain-text rendering: each section writes its title, a run of
/// `=` matching the title's length, its non-blank content lines, then a
/// blank line, with subsections one indent unit deeper.
pub fn render_text(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        render_into(section, 0, &mut out);
    }
    out
}

fn render_into(section: &Section, depth: usize, out: &mut String) {
    let indent = INDENT_UNIT.repeat(depth);
    out.push_str(&indent);
    out.push_str(&section.title);
    out.push('\n');
    out.push_str(&indent);
    out.push_str(&"=".repeat(section.title.chars().count()));
    out.push('\n');
    if !section.content.is_empty() {
        for line in section.content.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&indent);
            out.push_str(line.trim());
            out.push('\n');
        }
        out.push('\n');
    }
    for sub in &section.subsections {
        render_into(sub, depth + 1, out);
    }
}

/// Total number of sections in the forest, descendants included.
pub fn count_nodes(sections: &[Section]) -> usize {
    sections.iter().map(|s| 1 + count_nodes(&s.subsections)).sum()
}
