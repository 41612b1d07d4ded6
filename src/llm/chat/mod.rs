pub mod mistral;
pub mod openai;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::mistral::MistralChatClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::Conversation;

/// One entry of the chat-completion request body, shared by both backends
/// (the wire format is OpenAI-compatible in both cases).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProviderMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Requests one completion for the given turn sequence. The last entry
    /// is the new user turn; everything before it is context.
    async fn complete(
        &self,
        messages: &[ProviderMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Mistral => {
            let specific_client = MistralChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Maps stored turns to the provider request shape, oldest first.
pub fn provider_messages(conversation: &Conversation) -> Vec<ProviderMessage> {
    conversation.messages
        .iter()
        .map(|msg| ProviderMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}
