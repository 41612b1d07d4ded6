use serde::{ Deserialize, Serialize };

/// Inbound Telegram update as delivered to the webhook. Only the fields the
/// bot acts on are modeled; anything else leaves both options empty and the
/// update classifies as unsupported.
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// An update reduced to the variants the agent dispatches on.
#[derive(Clone, Debug)]
pub enum UpdateKind {
    /// A text message in a chat.
    Message {
        chat_id: i64,
        username: String,
        text: String,
    },
    /// An inline keyboard button press.
    Callback {
        callback_id: String,
        chat_id: Option<i64>,
        data: String,
    },
    /// Anything the bot does not act on (edits, stickers, joins, ...).
    Unsupported,
}

impl Update {
    pub fn classify(self) -> UpdateKind {
        if let Some(message) = self.message {
            if let Some(text) = message.text {
                let username = message.from
                    .and_then(|u| u.username)
                    .unwrap_or_else(|| "user".to_string());
                return UpdateKind::Message {
                    chat_id: message.chat.id,
                    username,
                    text,
                };
            }
            return UpdateKind::Unsupported;
        }

        if let Some(callback) = self.callback_query {
            if let Some(data) = callback.data {
                return UpdateKind::Callback {
                    callback_id: callback.id,
                    chat_id: callback.message.map(|m| m.chat.id),
                    data,
                };
            }
            return UpdateKind::Unsupported;
        }

        UpdateKind::Unsupported
    }
}

// --- REST API models ---

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessageRequest {
    pub chat_id: i64,
    pub username: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
}
