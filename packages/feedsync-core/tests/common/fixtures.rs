use feedsync_core::domain::{ContentItem, Element, ItemSystem};
use serde_json::json;
use std::collections::BTreeMap;

pub const SLUG: &str = "url_slug";

fn system(codename: &str, language: &str, item_type: &str) -> ItemSystem {
    ItemSystem {
        id: format!("id-{}", codename),
        name: codename.replace('_', " "),
        codename: codename.to_string(),
        language: language.to_string(),
        item_type: item_type.to_string(),
        collection: "default".to_string(),
        last_modified: None,
    }
}

fn text(element_type: &str, value: serde_json::Value, linked: &[&str]) -> Element {
    Element {
        element_type: element_type.to_string(),
        name: String::new(),
        value,
        modular_content: linked.iter().map(|s| s.to_string()).collect(),
    }
}

/// Indexable page with a slug and a rich-text body embedding `linked`.
pub fn page(codename: &str, language: &str, body: &str, linked: &[&str]) -> ContentItem {
    let mut elements = BTreeMap::new();
    elements.insert(SLUG.to_string(), text("url_slug", json!(codename.replace('_', "-")), &[]));
    elements.insert(
        "body".to_string(),
        text(Element::RICH_TEXT, json!(format!("<p>{}</p>", body)), linked),
    );
    ContentItem {
        system: system(codename, language, "page"),
        elements,
    }
}

/// Same as [`page`] without a slug: resolvable but not indexable.
pub fn unpublished(codename: &str, language: &str, body: &str) -> ContentItem {
    let mut item = page(codename, language, body, &[]);
    item.elements.remove(SLUG);
    item
}

/// Non-indexable component that gets transcluded into pages.
pub fn component(codename: &str, language: &str, title: &str) -> ContentItem {
    let mut elements = BTreeMap::new();
    elements.insert("title".to_string(), text(Element::TEXT, json!(title), &[]));
    ContentItem {
        system: system(codename, language, "component"),
        elements,
    }
}

/// Move an item into another collection.
pub fn in_collection(mut item: ContentItem, collection: &str) -> ContentItem {
    item.system.collection = collection.to_string();
    item
}
