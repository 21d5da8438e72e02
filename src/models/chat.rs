use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// A conversation record held by the document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Durable id (the store may send it as a string or an integer)
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub user_id: String,
    /// Provider selected for this conversation (API sends as "currentProvider")
    #[serde(alias = "currentProvider")]
    pub provider: String,
    #[serde(default, alias = "currentModel")]
    pub model: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Deterministic title used when no generated title is available.
///
/// Keeps the first `max_chars` characters and appends `...` when the
/// message was longer.
pub fn fallback_title(message: &str, max_chars: usize) -> String {
    let trimmed = message.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
