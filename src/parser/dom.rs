//! Parsed-content tree decoupled from any particular markup parser.
//!
//! The section pipeline only ever sees [`DomNode`]; `parse_document` is the
//! one place that touches the HTML parser. Feeding the pipeline from another
//! markup source just means building `DomNode`s some other way.

use scraper::{ElementRef, Html, Node as HtmlNode};

#[derive(Debug, Clone)]
pub enum DomNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<DomNode>,
    },
    Text(String),
}

impl DomNode {
    pub fn element(tag: &str) -> Self {
        DomNode::Element {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: &str) -> Self {
        DomNode::Text(content.to_string())
    }

    pub fn is_element(&self) -> bool {
        matches!(self, DomNode::Element { .. })
    }

    /// Tag name, lowercase. None for text nodes.
    pub fn tag(&self) -> Option<&str> {
        match self {
            DomNode::Element { tag, .. } => Some(tag),
            DomNode::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            DomNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            DomNode::Text(_) => None,
        }
    }

    /// True if the `class` attribute contains `name` as one of its
    /// whitespace-separated values.
    pub fn has_class(&self, name: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|cls| cls == name))
            .unwrap_or(false)
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } => children,
            DomNode::Text(_) => &[],
        }
    }

    pub fn push_child(&mut self, child: DomNode) {
        if let DomNode::Element { children, .. } = self {
            children.push(child);
        }
    }

    /// All descendant text, concatenated in document order.
    pub fn text_content(&self) -> String {
        match self {
            DomNode::Text(t) => t.clone(),
            DomNode::Element { children, .. } => {
                children.iter().map(|c| c.text_content()).collect()
            }
        }
    }

    /// Descendant text with runs of whitespace collapsed to single spaces
    /// and the ends trimmed.
    pub fn collapsed_text(&self) -> String {
        self.text_content()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// First descendant element (document order, self excluded) matching
    /// the predicate.
    pub fn find<'a>(&'a self, pred: &impl Fn(&DomNode) -> bool) -> Option<&'a DomNode> {
        for child in self.children() {
            if child.is_element() {
                if pred(child) {
                    return Some(child);
                }
                if let Some(found) = child.find(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Every descendant element (document order, self excluded) whose tag
    /// is in `tags`.
    pub fn find_all<'a>(&'a self, tags: &[&str], out: &mut Vec<&'a DomNode>) {
        for child in self.children() {
            if let Some(tag) = child.tag() {
                if tags.contains(&tag) {
                    out.push(child);
                }
                child.find_all(tags, out);
            }
        }
    }
}

/// Visit every descendant element in document order, handing each one the
/// slice of its following siblings (same depth, document order).
pub fn walk_elements<'a, F>(root: &'a DomNode, visit: &mut F)
where
    F: FnMut(&'a DomNode, &'a [DomNode]),
{
    let children = root.children();
    for (i, child) in children.iter().enumerate() {
        if child.is_element() {
            visit(child, &children[i + 1..]);
            walk_elements(child, visit);
        }
    }
}

/// Parse an HTML document into a [`DomNode`] tree rooted at `<html>`.
pub fn parse_document(html: &str) -> DomNode {
    let document = Html::parse_document(html);
    convert(document.root_element())
}

fn convert(element: ElementRef) -> DomNode {
    let mut node = DomNode::element(element.value().name());
    if let DomNode::Element { attrs, .. } = &mut node {
        for (k, v) in element.value().attrs() {
            attrs.push((k.to_string(), v.to_string()));
        }
    }

    for child in element.children() {
        match child.value() {
            HtmlNode::Text(text) => node.push_child(DomNode::text(&text.text)),
            HtmlNode::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    node.push_child(convert(child_element));
                }
            }
            _ => {}
        }
    }

    node
}
