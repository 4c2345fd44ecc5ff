//! In-memory store of known chats and the active chat.
//!
//! Every mutation takes `&mut self` and completes before returning, so a
//! reader holding the lock never observes a half-applied update.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ChatError, ChatResult};
use crate::types::{Chat, ChatId, DeliveryStatus, Message};

/// Shared handle to the transcript store
pub type SharedTranscript = Arc<RwLock<TranscriptStore>>;

/// Chats keyed by ID plus an optional active chat.
///
/// Invariant: `active`, when set, names a chat present in `chats`.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    chats: HashMap<ChatId, Chat>,
    active: Option<ChatId>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh store in a shared handle
    pub fn shared() -> SharedTranscript {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Insert or replace a chat by ID. Returns true if the chat was new.
    pub fn upsert_chat(&mut self, chat: Chat) -> bool {
        self.chats.insert(chat.id.clone(), chat).is_none()
    }

    /// Apply a chat as reported by the service.
    ///
    /// Title and timestamps come from the service. Messages are reconciled
    /// with the local copy rather than replaced: the service only holds
    /// persisted user turns, so rendered answers and `Pending` or `Unsent`
    /// turns exist locally only and must survive a refetch.
    pub fn merge_remote(&mut self, incoming: Chat) {
        let Some(local) = self.chats.get_mut(&incoming.id) else {
            self.chats.insert(incoming.id.clone(), incoming);
            return;
        };

        local.title = incoming.title;
        local.created_at = incoming.created_at;
        local.updated_at = local
            .updated_at
            .max(incoming.updated_at)
            .max(local.created_at);

        if !incoming.messages.is_empty() {
            let known = std::mem::take(&mut local.messages);
            local.messages = reconcile(known, incoming.messages);
        }
    }

    /// Set or clear the active chat. Unknown IDs are rejected.
    pub fn set_active(&mut self, chat_id: Option<&str>) -> ChatResult<()> {
        match chat_id {
            Some(id) if !self.chats.contains_key(id) => {
                Err(ChatError::ChatNotFound(id.to_string()))
            }
            Some(id) => {
                self.active = Some(id.to_string());
                Ok(())
            }
            None => {
                self.active = None;
                Ok(())
            }
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active.as_ref().and_then(|id| self.chats.get(id))
    }

    /// Append a message to the end of a chat.
    ///
    /// Returns false without touching anything when the chat is unknown; a
    /// late result for a chat deleted in the meantime lands here.
    pub fn append_message(&mut self, chat_id: &str, message: Message) -> bool {
        match self.chats.get_mut(chat_id) {
            Some(chat) => {
                chat.push(message);
                true
            }
            None => {
                debug!(chat_id = %chat_id, "Dropping message for unknown chat");
                false
            }
        }
    }

    /// Update the delivery flag of one message. Returns whether it was found.
    pub fn mark_delivery(&mut self, chat_id: &str, message_id: &str, status: DeliveryStatus) -> bool {
        self.chats
            .get_mut(chat_id)
            .and_then(|chat| chat.messages.iter_mut().find(|m| m.id == message_id))
            .map(|message| message.delivery = status)
            .is_some()
    }

    /// Returns whether the chat was found.
    pub fn rename_chat(&mut self, chat_id: &str, title: impl Into<String>) -> bool {
        match self.chats.get_mut(chat_id) {
            Some(chat) => {
                chat.title = title.into();
                true
            }
            None => false,
        }
    }

    /// Remove a chat, clearing the active reference if it pointed at it.
    pub fn remove_chat(&mut self, chat_id: &str) -> Option<Chat> {
        let removed = self.chats.remove(chat_id);
        if self.active.as_deref() == Some(chat_id) {
            self.active = None;
        }
        removed
    }

    /// Drop every chat, e.g. when the user signs out.
    pub fn clear(&mut self) {
        self.chats.clear();
        self.active = None;
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.get(chat_id)
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.chats.contains_key(chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Chats ordered most recently updated first.
    pub fn chats(&self) -> Vec<&Chat> {
        let mut chats: Vec<&Chat> = self.chats.values().collect();
        chats.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        chats
    }
}

/// Interleave the service's messages with the local ones.
///
/// Local messages keep their position and identity. A `Confirmed` or
/// `Pending` local message consumes the next service message with the same
/// role and content; service messages skipped on the way are inserted in
/// front of it. `Unsent` messages never match. Unmatched service messages
/// go at the end.
fn reconcile(local: Vec<Message>, remote: Vec<Message>) -> Vec<Message> {
    let mut remote: VecDeque<Message> = remote.into();
    let mut merged = Vec::with_capacity(local.len() + remote.len());

    for message in local {
        if message.delivery != DeliveryStatus::Unsent {
            let found = remote
                .iter()
                .position(|r| r.role == message.role && r.content == message.content);
            if let Some(offset) = found {
                merged.extend(remote.drain(..offset));
                remote.pop_front();
            }
        }
        merged.push(message);
    }

    merged.extend(remote);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn store_with(ids: &[&str]) -> TranscriptStore {
        let mut store = TranscriptStore::new();
        for id in ids {
            store.upsert_chat(Chat::new(*id, format!("Chat {}", id)));
        }
        store
    }

    fn user_with(content: &str, delivery: DeliveryStatus) -> Message {
        Message { delivery, ..Message::user(content) }
    }

    #[test]
    fn test_append_preserves_order_and_count() {
        let mut store = store_with(&["1"]);
        for i in 0..5 {
            assert!(store.append_message("1", Message::user(format!("m{}", i))));
        }

        let contents: Vec<_> = store.get("1").unwrap().messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_append_to_unknown_chat_is_noop() {
        let mut store = store_with(&["1"]);
        store.append_message("1", Message::user("kept"));
        let before = store.get("1").unwrap().clone();

        assert!(!store.append_message("missing", Message::user("lost")));
        assert_eq!(store.get("1").unwrap(), &before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_active_clears_reference() {
        let mut store = store_with(&["1", "2"]);
        store.set_active(Some("1")).unwrap();
        store.remove_chat("1");
        assert!(store.active_id().is_none());
    }

    #[test]
    fn test_remove_other_chat_keeps_active() {
        let mut store = store_with(&["1", "2"]);
        store.set_active(Some("1")).unwrap();
        store.remove_chat("2");
        assert_eq!(store.active_id(), Some("1"));
    }

    #[test]
    fn test_set_active_rejects_unknown_id() {
        let mut store = store_with(&["1"]);
        assert!(store.set_active(Some("nope")).is_err());
        assert!(store.active_id().is_none());

        store.set_active(Some("1")).unwrap();
        store.set_active(None).unwrap();
        assert!(store.active_chat().is_none());
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut store = store_with(&["1"]);
        assert!(!store.upsert_chat(Chat::new("1", "Renamed")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().title, "Renamed");
    }

    #[test]
    fn test_listing_orders_by_recency() {
        let mut store = TranscriptStore::new();
        let now = Utc::now();
        for (id, age) in [("old", 30), ("new", 1), ("mid", 10)] {
            let mut chat = Chat::new(id, id);
            chat.created_at = now - Duration::minutes(age);
            chat.updated_at = chat.created_at;
            store.upsert_chat(chat);
        }

        let ids: Vec<_> = store.chats().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        store.append_message("old", Message::user("bump"));
        assert_eq!(store.chats()[0].id, "old");
    }

    #[test]
    fn test_merge_remote_keeps_local_messages() {
        let mut store = store_with(&["1"]);
        store.append_message("1", Message::user("local"));

        let mut listed = Chat::new("1", "Server title");
        listed.updated_at = Utc::now() - Duration::days(1);
        store.merge_remote(listed);

        let chat = store.get("1").unwrap();
        assert_eq!(chat.title, "Server title");
        assert_eq!(chat.messages.len(), 1);
        assert!(chat.updated_at >= chat.created_at);
    }

    #[test]
    fn test_merge_remote_keeps_local_only_messages() {
        let mut store = store_with(&["1"]);
        let pending = user_with("in flight", DeliveryStatus::Pending);
        let pending_id = pending.id.clone();
        for message in [
            user_with("first", DeliveryStatus::Confirmed),
            Message::assistant("answer"),
            user_with("retry me", DeliveryStatus::Unsent),
            pending,
        ] {
            store.append_message("1", message);
        }

        let mut fetched = Chat::new("1", "Chat 1");
        fetched.messages = vec![Message::user("first"), Message::user("from elsewhere")];
        store.merge_remote(fetched);

        let chat = store.get("1").unwrap();
        let contents: Vec<_> = chat.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "answer", "retry me", "in flight", "from elsewhere"]);
        assert_eq!(chat.messages[2].delivery, DeliveryStatus::Unsent);
        assert!(store.mark_delivery("1", &pending_id, DeliveryStatus::Confirmed));
    }

    #[test]
    fn test_merge_remote_matches_pending_and_unsent_separately() {
        let mut store = store_with(&["1"]);
        let pending = user_with("again", DeliveryStatus::Pending);
        let pending_id = pending.id.clone();
        store.append_message("1", user_with("again", DeliveryStatus::Unsent));
        store.append_message("1", pending);

        let mut fetched = Chat::new("1", "Chat 1");
        fetched.messages = vec![Message::user("earlier"), Message::user("again")];
        store.merge_remote(fetched);

        let chat = store.get("1").unwrap();
        let contents: Vec<_> = chat.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["again", "earlier", "again"]);
        assert_eq!(chat.messages[0].delivery, DeliveryStatus::Unsent);
        assert_eq!(chat.messages[2].id, pending_id);
    }

    #[test]
    fn test_merge_remote_inserts_unknown_chat() {
        let mut store = TranscriptStore::new();
        let mut fetched = Chat::new("9", "Remote");
        fetched.messages = vec![Message::user("hello")];
        store.merge_remote(fetched);

        assert_eq!(store.get("9").unwrap().messages.len(), 1);
    }

    #[test]
    fn test_mark_delivery() {
        let mut store = store_with(&["1"]);
        let msg = Message::user("hi");
        let id = msg.id.clone();
        store.append_message("1", msg);

        assert!(store.mark_delivery("1", &id, DeliveryStatus::Confirmed));
        assert_eq!(store.get("1").unwrap().messages[0].delivery, DeliveryStatus::Confirmed);
        assert!(!store.mark_delivery("1", "other", DeliveryStatus::Unsent));
    }

    #[test]
    fn test_rename_and_clear() {
        let mut store = store_with(&["1"]);
        assert!(store.rename_chat("1", "Notes"));
        assert!(!store.rename_chat("2", "Nope"));
        assert_eq!(store.get("1").unwrap().title, "Notes");

        store.set_active(Some("1")).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.active_id().is_none());
    }
}
