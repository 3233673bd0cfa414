use std::fmt::Write;

use tracing::warn;

use super::{BookMap, MetadataValue, MstBook};

/// Metadata keys that never reach the prompt: bookkeeping fields and
/// duplicates of the book's own title and identifiers.
pub const SKIPPED_METADATA_KEYS: &[&str] = &[
    "bibRecordCategory",
    "bibRecordSubCategory",
    "identifier",
    "publicationPlace",
    "title",
];

/// `title:..\nsummary:..\nmetadata:\n` followed by one `* key: value` line per
/// renderable metadata entry, keys in sorted order.
pub fn render_book(book: &MstBook) -> String {
    let mut out = format!("title:{}\nsummary:{}\nmetadata:\n", book.title, book.summary);
    for (key, value) in &book.metadata {
        if SKIPPED_METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(rendered) = render_value(value) {
            let _ = writeln!(out, "* {key}: {rendered}");
        }
    }
    out
}

/// One book block headed by its 1-based position in the batch.
pub fn render_prompt(book: &MstBook, ordinal: usize) -> String {
    format!("[{ordinal}]\n{}", render_book(book))
}

/// All books, sorted by key so the same input always yields the same text.
pub fn render_batch_prompt(books: &BookMap) -> String {
    let mut keys: Vec<&String> = books.keys().collect();
    keys.sort();
    keys.iter()
        .enumerate()
        .map(|(i, key)| render_prompt(&books[*key], i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_value(value: &MetadataValue) -> Option<String> {
    match value {
        MetadataValue::Null => None,
        MetadataValue::Text(s) if s.is_empty() => None,
        MetadataValue::Text(s) => Some(s.clone()),
        MetadataValue::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        MetadataValue::Map(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k}:{v}"))
                .collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        other @ (MetadataValue::Bool(_) | MetadataValue::Number(_)) => {
            warn!("Unsupported metadata value shape, skipping: {other}");
            None
        }
    }
}
