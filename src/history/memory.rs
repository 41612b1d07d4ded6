use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::Mutex;
use crate::history::ConversationStore;
use crate::models::chat::{ ChatMessage, Conversation, Role };

/// In-memory conversation store for local development and tests. All
/// appends serialize under one async mutex, so racing appends for the same
/// conversation cannot drop turns. State does not survive a restart.
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversations = self.conversations.lock().await;
        let messages = conversations.entry(conversation_id.to_string()).or_default();
        let timestamp = messages
            .last()
            .map(|m| m.timestamp.max(Utc::now().timestamp_millis()))
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        messages.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp,
        });
        Ok(())
    }

    async fn recent(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let conversations = self.conversations.lock().await;
        let messages = match conversations.get(conversation_id) {
            Some(all) => {
                let start = all.len().saturating_sub(limit);
                all[start..].to_vec()
            }
            None => Vec::new(),
        };

        Ok(Conversation {
            id: conversation_id.to_string(),
            messages,
        })
    }

    async fn reset(&self, conversation_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversations = self.conversations.lock().await;
        if let Some(messages) = conversations.get_mut(conversation_id) {
            messages.clear();
        }
        Ok(())
    }
}
