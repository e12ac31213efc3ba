//! Small XML helpers shared by the dispatcher and bridge parsing.

use xmltree::Element;

/// Text content of a direct child element, if present.
pub(crate) fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.into_owned())
}

/// Decode HTML entities in a payload that embeds XML as escaped text.
pub(crate) fn decode_entities(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

/// Collect every descendant element with the given name, depth-first.
pub(crate) fn collect_named<'a>(element: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in element.children.iter().filter_map(|n| n.as_element()) {
        if child.name == name {
            out.push(child);
        }
        collect_named(child, name, out);
    }
}
