//! HTML to plain-text extraction for fetched evidence pages.

use scraper::{ElementRef, Html, Node};

/// Markup subtrees that never contribute evidence text.
const EXCLUDED_ELEMENTS: [&str; 8] = [
    "script", "style", "head", "nav", "footer", "iframe", "img", "noscript",
];

/// Extracts normalized plain text from raw HTML.
///
/// Excluded subtrees are dropped wholesale, whitespace runs collapse to
/// single spaces and the result is trimmed. Malformed markup never errors;
/// the parser recovers what it can and the worst case is an empty string.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(&document.root_element(), &mut raw);

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(node: &ElementRef<'_>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) => {
                if EXCLUDED_ELEMENTS.contains(&element.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, out);
                }
            }
            _ => {}
        }
    }
}
