//! Projection of a resolved subtree into a [`SearchableDocument`]
//!
//! ```text
//! ResolvedSubtree { root, related } → [ContentBlock; 1 + related.len()] → SearchableDocument
//! ```
//!
//! Every block carries the plain text of its item's text and rich-text
//! elements. Related items keep their own block so the index can answer
//! "which documents contain item X" (owner discovery).

use once_cell::sync::Lazy;
use regex::Regex;

use super::identity::object_id;
use super::indexability::IndexabilityRule;
use super::models::{ContentBlock, ContentItem, Element, ResolvedSubtree, SearchableDocument};

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Build the index document for a resolved subtree.
///
/// Identity comes from the root's codename and language only.
pub fn build_document(subtree: &ResolvedSubtree, rule: &IndexabilityRule) -> SearchableDocument {
    let root = &subtree.root;

    let content = std::iter::once(root)
        .chain(subtree.related.iter())
        .map(content_block)
        .collect();

    SearchableDocument {
        object_id: object_id(root.codename(), root.language()),
        codename: root.codename().to_string(),
        language: root.language().to_string(),
        name: root.system.name.clone(),
        slug: rule.slug(root).unwrap_or_default().to_string(),
        collection: root.system.collection.clone(),
        content,
    }
}

fn content_block(item: &ContentItem) -> ContentBlock {
    let contents = item
        .elements
        .values()
        .filter(|el| el.element_type == Element::TEXT || el.element_type == Element::RICH_TEXT)
        .filter_map(|el| el.as_text())
        .map(plain_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    ContentBlock {
        codename: item.codename().to_string(),
        name: item.system.name.clone(),
        item_type: item.system.item_type.clone(),
        language: item.language().to_string(),
        contents,
    }
}

/// Strip markup, decode the common entities and collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let stripped = MARKUP.replace_all(html, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}
