use async_trait::async_trait;
use log::{ error, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use url::Url;

/// Outbound side of the chat platform. The agent talks to this seam so
/// tests can record deliveries instead of calling the Bot API.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Delivers a text reply to a chat. `with_feedback_keyboard` attaches
    /// the inline thumbs-up/down buttons under the message.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        with_feedback_keyboard: bool
    ) -> Result<(), Box<dyn StdError + Send + Sync>>;

    /// Shows the "typing..." indicator while a completion is in flight.
    async fn send_typing(&self, chat_id: i64) -> Result<(), Box<dyn StdError + Send + Sync>>;

    /// Acknowledges an inline keyboard press so the client stops its spinner.
    async fn answer_callback(
        &self,
        callback_id: &str
    ) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Serialize)]
struct SendChatActionRequest {
    chat_id: i64,
    action: &'static str,
}

#[derive(Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Deserialize, Debug, Default)]
pub struct WebhookInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pending_update_count: i64,
}

/// Thin client over the Telegram Bot API.
pub struct TelegramClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T, R>(&self, method: &str, body: &T) -> Result<R, Box<dyn StdError + Send + Sync>>
        where T: Serialize + Sync, R: for<'de> Deserialize<'de> + Default
    {
        let resp = self.http
            .post(self.method_url(method))
            .json(body)
            .send().await?
            .error_for_status()?
            .json::<ApiResponse<R>>().await?;

        if !resp.ok {
            let description = resp.description.unwrap_or_else(|| "unknown error".to_string());
            return Err(format!("Telegram {} failed: {}", method, description).into());
        }

        resp.result.ok_or_else(|| format!("Telegram {} returned no result", method).into())
    }

    /// Registers `webhook_url` as the update delivery endpoint, skipping the
    /// call when the same URL is already registered. Telegram only accepts
    /// HTTPS webhook endpoints.
    pub async fn set_webhook(
        &self,
        webhook_url: &str
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let parsed = Url::parse(webhook_url).map_err(|e|
            format!("Invalid webhook URL '{}': {}", webhook_url, e)
        )?;
        if parsed.scheme() != "https" {
            return Err(format!("Webhook URL must use https, got '{}'", webhook_url).into());
        }

        let current = self.get_webhook_info().await?;
        if current.url == webhook_url {
            info!("Webhook already registered at {}", webhook_url);
            return Ok(());
        }
        if current.url.is_empty() {
            info!("Registering webhook at {}", webhook_url);
        } else {
            info!("Changing webhook: {} -> {}", current.url, webhook_url);
        }

        let _: bool = self.call("setWebhook", &(SetWebhookRequest { url: webhook_url })).await?;
        info!("Webhook registered");
        Ok(())
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, Box<dyn StdError + Send + Sync>> {
        let resp = self.http
            .get(self.method_url("getWebhookInfo"))
            .send().await?
            .error_for_status()?
            .json::<ApiResponse<WebhookInfo>>().await?;

        if !resp.ok {
            let description = resp.description.unwrap_or_else(|| "unknown error".to_string());
            return Err(format!("Telegram getWebhookInfo failed: {}", description).into());
        }

        Ok(resp.result.unwrap_or_default())
    }

    pub async fn delete_webhook(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let current = self.get_webhook_info().await?;
        if current.url.is_empty() {
            info!("No webhook registered, nothing to delete");
            return Ok(());
        }

        let _: bool = self.call("deleteWebhook", &serde_json::json!({})).await?;
        info!("Webhook {} deleted", current.url);
        Ok(())
    }

    fn feedback_keyboard() -> InlineKeyboardMarkup {
        InlineKeyboardMarkup {
            inline_keyboard: vec![
                vec![
                    InlineKeyboardButton {
                        text: "\u{1F44D}".to_string(),
                        callback_data: "feedback_positive".to_string(),
                    },
                    InlineKeyboardButton {
                        text: "\u{1F44E}".to_string(),
                        callback_data: "feedback_negative".to_string(),
                    }
                ]
            ],
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        with_feedback_keyboard: bool
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let req = SendMessageRequest {
            chat_id,
            text,
            reply_markup: with_feedback_keyboard.then(Self::feedback_keyboard),
        };

        if let Err(e) = self.call::<_, serde_json::Value>("sendMessage", &req).await {
            error!("Failed to send message to chat {}: {}", chat_id, e);
            return Err(e);
        }
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let req = SendChatActionRequest {
            chat_id,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &req).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let req = AnswerCallbackRequest {
            callback_query_id: callback_id,
        };
        let _: bool = self.call("answerCallbackQuery", &req).await?;
        Ok(())
    }
}
