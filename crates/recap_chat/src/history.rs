//! Read-only queries over the transcript for the history browser.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transcript::TranscriptStore;
use crate::types::{Chat, ChatId};

const PREVIEW_CHARS: usize = 80;

/// Chats whose title or any message contains `query`, ignoring case.
///
/// The query is used as typed, surrounding whitespace included. Only the
/// empty query matches every chat. Results keep the store's recency order.
pub fn search<'a>(store: &'a TranscriptStore, query: &str) -> Vec<&'a Chat> {
    let needle = query.to_lowercase();
    store
        .chats()
        .into_iter()
        .filter(|chat| chat_matches(chat, &needle))
        .collect()
}

/// `needle` must already be lowercased.
fn chat_matches(chat: &Chat, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    chat.title.to_lowercase().contains(needle)
        || chat
            .messages
            .iter()
            .any(|message| message.content.to_lowercase().contains(needle))
}

/// One row of the history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: ChatId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    /// First line of the latest message, shortened
    pub preview: Option<String>,
}

impl From<&Chat> for HistoryEntry {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            updated_at: chat.updated_at,
            message_count: chat.messages.len(),
            preview: chat.last_message().map(|m| preview(&m.content)),
        }
    }
}

fn preview(content: &str) -> String {
    let line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let mut short: String = line.chars().take(PREVIEW_CHARS - 3).collect();
    short.push_str("...");
    short
}

/// [`search`] projected into listing rows.
pub fn search_entries(store: &TranscriptStore, query: &str) -> Vec<HistoryEntry> {
    search(store, query).into_iter().map(HistoryEntry::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use chrono::Duration;

    fn store() -> TranscriptStore {
        let now = Utc::now();
        let mut store = TranscriptStore::new();

        let mut rust = Chat::new("1", "Rust ownership");
        rust.updated_at = now - Duration::minutes(10);
        rust.messages.push(Message::user("What is a borrow?"));
        store.upsert_chat(rust);

        let mut news = Chat::new("2", "Morning news");
        news.updated_at = now;
        news.messages.push(Message::user("I shared this URL: https://example.com/Tokio-release"));
        store.upsert_chat(news);

        let mut empty = Chat::new("3", "New Chat");
        empty.updated_at = now - Duration::minutes(20);
        store.upsert_chat(empty);

        store
    }

    fn ids(chats: Vec<&Chat>) -> Vec<&str> {
        chats.into_iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_matches_all_in_recency_order() {
        let store = store();
        assert_eq!(ids(search(&store, "")), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_whitespace_is_part_of_the_query() {
        let store = store();
        assert!(search(&store, " rust").is_empty());
        assert_eq!(ids(search(&store, " news")), vec!["2"]);
        assert!(search(&store, "   ").is_empty());
    }

    #[test]
    fn test_title_and_content_match_case_insensitively() {
        let store = store();
        assert_eq!(ids(search(&store, "RUST")), vec!["1"]);
        assert_eq!(ids(search(&store, "tokio")), vec!["2"]);
        assert_eq!(ids(search(&store, "borrow")), vec!["1"]);
        assert!(search(&store, "kubernetes").is_empty());
    }

    #[test]
    fn test_empty_store() {
        assert!(search(&TranscriptStore::new(), "anything").is_empty());
        assert!(search(&TranscriptStore::new(), "").is_empty());
    }

    #[test]
    fn test_entries() {
        let store = store();
        let entries = search_entries(&store, "news");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message_count, 1);
        assert_eq!(
            entries[0].preview.as_deref(),
            Some("I shared this URL: https://example.com/Tokio-release")
        );

        let long = "x".repeat(200);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("\n## Summary\nbody"), "## Summary");
    }
}
