//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the pending-edit and conversation-memory
//! ports. Both are volatile: a restart forgets every staged edit and every
//! thread. The explicit get/put/delete surface keeps call sites unchanged
//! if a durable backing is ever swapped in.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use doc_assistant_core::domain::{ChatTurn, PendingEdit};
use doc_assistant_core::ports::{ConversationStore, PendingEditStore, PortResult};

//=========================================================================================
// Pending-Edit Store
//=========================================================================================

/// One pending-edit slot per user, last write wins.
#[derive(Clone, Default)]
pub struct InMemoryPendingEditStore {
    entries: Arc<RwLock<HashMap<Uuid, PendingEdit>>>,
}

impl InMemoryPendingEditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a staged slot (useful for tests).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl PendingEditStore for InMemoryPendingEditStore {
    async fn put(&self, user_id: Uuid, edit: PendingEdit) -> PortResult<()> {
        self.entries.write().await.insert(user_id, edit);
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>> {
        Ok(self.entries.read().await.get(&user_id).cloned())
    }

    async fn clear_proposed(&self, user_id: Uuid) -> PortResult<()> {
        if let Some(edit) = self.entries.write().await.get_mut(&user_id) {
            edit.proposed_content = None;
        }
        Ok(())
    }

    async fn consume_and_delete(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>> {
        Ok(self.entries.write().await.remove(&user_id))
    }
}

//=========================================================================================
// Conversation Store
//=========================================================================================

/// Per-thread message history, keyed by thread id.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    threads: Arc<RwLock<HashMap<String, Vec<ChatTurn>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, thread_id: &str) -> PortResult<Vec<ChatTurn>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, thread_id: &str, turns: Vec<ChatTurn>) -> PortResult<()> {
        self.threads.write().await.insert(thread_id.to_string(), turns);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> PortResult<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_assistant_core::domain::TurnRole;

    #[tokio::test]
    async fn pending_store_put_get_round_trips() {
        let store = InMemoryPendingEditStore::new();
        let user = Uuid::new_v4();

        assert!(store.get(user).await.unwrap().is_none());

        store
            .put(user, PendingEdit::new("selected".to_string(), Some(1), Some(9)))
            .await
            .unwrap();
        let edit = store.get(user).await.unwrap().unwrap();
        assert_eq!(edit.selected_content, "selected");
        assert!(edit.proposed_content.is_none());
    }

    #[tokio::test]
    async fn pending_store_last_write_wins() {
        // One slot per user is a deliberate product limitation: a newer
        // selection silently replaces the old one.
        let store = InMemoryPendingEditStore::new();
        let user = Uuid::new_v4();

        store
            .put(user, PendingEdit::new("first".to_string(), None, None))
            .await
            .unwrap();
        store
            .put(user, PendingEdit::new("second".to_string(), None, None))
            .await
            .unwrap();

        let edit = store.get(user).await.unwrap().unwrap();
        assert_eq!(edit.selected_content, "second");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_proposed_keeps_the_selection() {
        let store = InMemoryPendingEditStore::new();
        let user = Uuid::new_v4();

        let mut edit = PendingEdit::new("selected".to_string(), None, None);
        edit.proposed_content = Some("proposal".to_string());
        store.put(user, edit).await.unwrap();

        store.clear_proposed(user).await.unwrap();
        let edit = store.get(user).await.unwrap().unwrap();
        assert_eq!(edit.selected_content, "selected");
        assert!(edit.proposed_content.is_none());

        // Clearing an absent slot is a no-op, not an error.
        store.clear_proposed(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn consume_and_delete_empties_the_slot() {
        let store = InMemoryPendingEditStore::new();
        let user = Uuid::new_v4();

        store
            .put(user, PendingEdit::new("selected".to_string(), None, None))
            .await
            .unwrap();
        let consumed = store.consume_and_delete(user).await.unwrap();
        assert!(consumed.is_some());
        assert!(store.get(user).await.unwrap().is_none());
        assert!(store.consume_and_delete(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conversation_store_keeps_threads_isolated() {
        let store = InMemoryConversationStore::new();

        store
            .put("user-a", vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")])
            .await
            .unwrap();
        store.put("user-b", vec![ChatTurn::user("hey")]).await.unwrap();

        let a = store.get("user-a").await.unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].role, TurnRole::User);
        assert_eq!(store.get("user-b").await.unwrap().len(), 1);
        assert!(store.get("user-c").await.unwrap().is_empty());

        store.delete("user-a").await.unwrap();
        assert!(store.get("user-a").await.unwrap().is_empty());
    }
}
