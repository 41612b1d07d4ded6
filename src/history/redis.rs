use async_trait::async_trait;
use chrono::Utc;
use log::error;
use redis::{ AsyncCommands, Client };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use crate::cli::Args;
use crate::history::ConversationStore;
use crate::models::chat::{ ChatMessage, Conversation, Role };

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    content: String,
    timestamp: i64,
}

/// Durable conversation store, one Redis list per conversation. LPUSH and
/// DEL are atomic server-side, so racing appends for the same key serialize
/// in the server and a reset cannot leave a partial sequence behind.
pub struct RedisConversationStore {
    client: Client,
    key_prefix: String,
}

impl RedisConversationStore {
    pub fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(args.history_host.as_str())?,
            key_prefix: args.history_redis_prefix,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let message = StoredMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };

        let json_msg = serde_json::to_string(&message)?;
        let _: i64 = conn.lpush(self.key(conversation_id), &json_msg).await?;
        Ok(())
    }

    async fn recent(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        // LRANGE 0 -1 would mean the whole list, not a zero-turn window.
        if limit == 0 {
            return Ok(Conversation {
                id: conversation_id.to_string(),
                messages: Vec::new(),
            });
        }

        let mut conn = self.get_connection().await?;
        let json_entries: Vec<String> = conn.lrange(
            self.key(conversation_id),
            0,
            (limit as isize) - 1
        ).await?;

        Ok(Conversation {
            id: conversation_id.to_string(),
            messages: decode_entries(&json_entries),
        })
    }

    async fn reset(&self, conversation_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let _: i64 = conn.del(self.key(conversation_id)).await?;
        Ok(())
    }
}

/// Decodes an LRANGE result (newest first) into chronological turns.
/// Timestamps are stamped client-side before the LPUSH reaches the server,
/// so two racing appends for the same key can land in the list with their
/// stamps swapped; the stable sort restores non-decreasing timestamp order
/// on read.
fn decode_entries(json_entries: &[String]) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    for json_entry in json_entries {
        match serde_json::from_str::<StoredMessage>(json_entry) {
            Ok(msg) => {
                messages.push(ChatMessage {
                    role: msg.role,
                    content: msg.content,
                    timestamp: msg.timestamp,
                });
            }
            Err(e) => {
                error!("Error parsing history entry: {}", e);
            }
        }
    }
    messages.reverse();
    messages.sort_by_key(|m| m.timestamp);
    messages
}
