//! Read-only helpers over the parsed document tree.

use scraper::ElementRef;

/// Collects every non-blank text node below `root`, trimmed, in document
/// order. Subtrees whose root element satisfies `skip` are not entered.
pub(crate) fn text_nodes<'a, F>(root: ElementRef<'a>, skip: &F) -> Vec<&'a str>
where
    F: Fn(ElementRef<'a>) -> bool,
{
    let mut out = Vec::new();
    push_text_nodes(root, skip, &mut out);
    out
}

fn push_text_nodes<'a, F>(root: ElementRef<'a>, skip: &F, out: &mut Vec<&'a str>)
where
    F: Fn(ElementRef<'a>) -> bool,
{
    for child in root.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(trimmed);
            }
        } else if let Some(element) = ElementRef::wrap(child) {
            if !skip(element) {
                push_text_nodes(element, skip, out);
            }
        }
    }
}

/// Whether any ancestor of `element` strictly below `root` satisfies `pred`.
pub(crate) fn has_ancestor_below<'a, F>(element: ElementRef<'a>, root: ElementRef<'a>, pred: F) -> bool
where
    F: Fn(ElementRef<'a>) -> bool,
{
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| *ancestor != root)
        .any(pred)
}

/// Collapses every whitespace run to a single space and trims the ends.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
