//! Items queued for indexing.
//!
//! An item is a caller-identified record carrying enough content to
//! produce an embedding. External ids are caller-assigned and stable
//! across index rebuilds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field consulted first when extracting text from a structured record.
pub const DEFAULT_CONTENT_FIELD: &str = "content";

/// Embeddable content of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    /// Free text
    Text(String),
    /// Structured record (e.g., an email or product as JSON)
    Record(Value),
}

impl ItemContent {
    /// Extract the text to embed.
    ///
    /// Structured records yield `content_field` when it holds a non-empty
    /// value; otherwise scalar fields are concatenated as `key: value`
    /// pairs. Returns `None` when no usable text is found.
    pub fn extract_text(&self, content_field: &str) -> Option<String> {
        match self {
            ItemContent::Text(text) => non_empty(text.clone()),
            ItemContent::Record(value) => extract_from_value(value, content_field),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_from_value(value: &Value, content_field: &str) -> Option<String> {
    let map = match value {
        Value::Object(map) => map,
        Value::String(s) => return non_empty(s.clone()),
        Value::Null => return None,
        other => return non_empty(other.to_string()),
    };

    if let Some(field) = map.get(content_field) {
        let text = match field {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if let Some(text) = non_empty(text) {
            return Some(text);
        }
    }

    // Fallback: concatenate scalar fields
    let parts: Vec<String> = map
        .iter()
        .filter_map(|(key, val)| match val {
            Value::String(s) => Some(format!("{}: {}", key, s)),
            Value::Number(n) => Some(format!("{}: {}", key, n)),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// An item queued for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Caller-assigned external id
    pub id: u64,
    /// Content to embed
    pub content: ItemContent,
}

impl Item {
    pub fn new(id: u64, content: ItemContent) -> Self {
        Self { id, content }
    }

    /// Convenience constructor for plain-text items.
    pub fn text(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            content: ItemContent::Text(text.into()),
        }
    }

    /// Convenience constructor for structured items.
    pub fn record(id: u64, record: Value) -> Self {
        Self {
            id,
            content: ItemContent::Record(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_text() {
        let content = ItemContent::Text("hello world".to_string());
        assert_eq!(
            content.extract_text(DEFAULT_CONTENT_FIELD),
            Some("hello world".to_string())
        );
    }

    #[test]
    fn test_extract_empty_text_is_none() {
        let content = ItemContent::Text("   ".to_string());
        assert_eq!(content.extract_text(DEFAULT_CONTENT_FIELD), None);
    }

    #[test]
    fn test_extract_content_field() {
        let content = ItemContent::Record(json!({
            "subject": "Lunch plans",
            "content": "Shall we grab lunch at noon?",
        }));
        assert_eq!(
            content.extract_text(DEFAULT_CONTENT_FIELD),
            Some("Shall we grab lunch at noon?".to_string())
        );
    }

    #[test]
    fn test_extract_custom_content_field() {
        let content = ItemContent::Record(json!({
            "body": "Quarterly report attached",
        }));
        assert_eq!(
            content.extract_text("body"),
            Some("Quarterly report attached".to_string())
        );
    }

    #[test]
    fn test_extract_fallback_concatenates_scalars() {
        let content = ItemContent::Record(json!({
            "subject": "Meeting",
            "priority": 2,
            "tags": ["a", "b"],
        }));
        let text = content.extract_text(DEFAULT_CONTENT_FIELD).unwrap();
        assert!(text.contains("subject: Meeting"));
        assert!(text.contains("priority: 2"));
        // Non-scalar fields are skipped
        assert!(!text.contains("tags"));
    }

    #[test]
    fn test_extract_record_with_no_text() {
        let content = ItemContent::Record(json!({ "tags": ["a"] }));
        assert_eq!(content.extract_text(DEFAULT_CONTENT_FIELD), None);
    }

    #[test]
    fn test_item_serde_roundtrip() {
        let item = Item::record(7, json!({ "content": "hi" }));
        let bytes = serde_json::to_vec(&item).unwrap();
        let decoded: Item = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(
            decoded.content.extract_text(DEFAULT_CONTENT_FIELD),
            Some("hi".to_string())
        );
    }
}
