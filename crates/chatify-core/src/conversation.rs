use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "New conversation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// A fresh conversation. Blank titles fall back to [`DEFAULT_TITLE`].
    pub fn new(user_id: String, title: Option<&str>) -> Self {
        let now = Utc::now();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            title,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Title derived from the first prompt of a conversation, capped at 80 chars.
pub fn title_from_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    let truncated: String = prompt.chars().take(80).collect();
    if truncated.len() < prompt.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
