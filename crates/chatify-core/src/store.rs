use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::error::StorageError;
use crate::message::{Message, NewMessage};

/// Persistence for conversations and their messages.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Messages of a conversation, oldest first.
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError>;

    /// Writes all `messages` or none of them. The returned rows carry the
    /// assigned ids and timestamps in the order submitted.
    async fn append_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        messages: &[NewMessage],
    ) -> Result<Vec<Message>, StorageError>;

    /// Advances the conversation's `updated_at` to now.
    async fn touch_conversation(&self, conversation_id: &str) -> Result<(), StorageError>;

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<Conversation, StorageError>;

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StorageError>;

    /// Conversations owned by `user_id`, most recently active first.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StorageError>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), StorageError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), StorageError>;
}
