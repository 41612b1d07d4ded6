mod memory;
mod redis;

pub use memory::MemoryConversationStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use crate::cli::Args;
use crate::models::chat::{ Conversation, Role };

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends one turn. Appends for the same conversation must serialize;
    /// out-of-order insertion is not possible through this interface.
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Returns the last `limit` turns in chronological order.
    async fn recent(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    /// Clears the turn sequence atomically. The conversation identifier
    /// remains valid and usable afterwards.
    async fn reset(&self, conversation_id: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}

pub fn create_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryConversationStore::new())),
        "redis" => {
            let store = redis::RedisConversationStore::new(args.clone())?;
            Ok(Arc::new(store))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    if args.history_type.eq_ignore_ascii_case("memory") {
        info!("Conversation history stored in memory (single-instance mode only)");
    } else {
        info!(
            "Conversation history stored in: {} at {}",
            args.history_type,
            args.history_host
        );
    }
    create_conversation_store(args)
}
