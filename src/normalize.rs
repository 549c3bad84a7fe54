//! Caption response parsing and normalization.
//!
//! The generate-captions endpoint has answered with plain strings, with
//! objects carrying a `content` field, and occasionally with other shapes.
//! Each item is classified into a [`CaptionItem`] and mapped to display text
//! by a total function, so a new item shape degrades to its JSON text
//! instead of breaking caption display.

use serde_json::Value;

use crate::error::{CaptionError, Result};
use crate::types::RawResponse;

/// One element of a generate-captions result array.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionItem {
    /// A bare string caption.
    Text(String),
    /// An object with a `content` field; holds that field's value.
    Content(Value),
    /// Anything else, kept verbatim.
    Other(Value),
}

impl CaptionItem {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(s) => CaptionItem::Text(s),
            Value::Object(mut map) if map.contains_key("content") => {
                CaptionItem::Content(map.remove("content").unwrap_or(Value::Null))
            }
            other => CaptionItem::Other(other),
        }
    }

    /// Display text for this item.
    pub fn into_caption(self) -> String {
        match self {
            CaptionItem::Text(s) => s,
            CaptionItem::Content(Value::String(s)) => s,
            CaptionItem::Content(Value::Null) => String::new(),
            CaptionItem::Content(v) => v.to_string(),
            CaptionItem::Other(v) => v.to_string(),
        }
    }
}

/// Normalize a result array into caption strings, preserving order.
pub fn normalize_captions(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| CaptionItem::classify(item).into_caption())
        .collect()
}

/// Parse a successful generate-captions body.
///
/// Only a JSON array is accepted. An empty body, malformed JSON, or any
/// non-array value is [`CaptionError::UnexpectedShape`].
pub fn parse_caption_body(response: &RawResponse) -> Result<Vec<Value>> {
    let unexpected = || CaptionError::UnexpectedShape {
        status: response.status,
        body: response.body.clone(),
    };

    let trimmed = response.body.trim();
    if trimmed.is_empty() {
        return Err(unexpected());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) | Err(_) => Err(unexpected()),
    }
}
