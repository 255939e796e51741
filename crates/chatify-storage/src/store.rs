use async_trait::async_trait;
use chatify_core::conversation::Conversation;
use chatify_core::error::StorageError;
use chatify_core::message::{Message, NewMessage};
use chatify_core::store::ConversationStore;

use crate::Database;

#[async_trait]
impl ConversationStore for Database {
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        self.messages().list(conversation_id).await
    }

    async fn append_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        messages: &[NewMessage],
    ) -> Result<Vec<Message>, StorageError> {
        self.messages().append(conversation_id, user_id, messages).await
    }

    async fn touch_conversation(&self, conversation_id: &str) -> Result<(), StorageError> {
        self.conversations().touch(conversation_id).await
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<Conversation, StorageError> {
        let conversation = Conversation::new(user_id.to_string(), title);
        self.conversations().create(&conversation).await?;
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StorageError> {
        self.conversations().get(id).await
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StorageError> {
        self.conversations().list(user_id).await
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), StorageError> {
        self.conversations().rename(id, title).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StorageError> {
        self.conversations().delete(id).await
    }
}
