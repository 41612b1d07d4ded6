use crate::cli::Args;
use crate::config::replies::{ load_replies, Replies };
use crate::error::BotError;
use crate::history::{ initialize_conversation_store, ConversationStore };
use crate::llm::chat::{ new_client as new_chat_client, provider_messages, ChatClient, ProviderMessage };
use crate::llm::{ parse_llm_type, LlmConfig };
use crate::models::chat::Role;
use crate::models::update::{ Update, UpdateKind };
use crate::telegram::{ Messenger, TelegramClient };

use log::{ info, warn };
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Reserved command tokens recognized before provider dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Chat,
    Reset,
    Help,
}

impl Command {
    /// Commands arrive as `/name` or `/name@BotName`.
    fn parse(text: &str) -> Option<Self> {
        let token = text.trim().split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Command::Start),
            "chat" => Some(Command::Chat),
            "reset" => Some(Command::Reset),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub history_limit: usize,
    pub provider_timeout: Duration,
    pub retry_backoff: Duration,
}

impl DispatchSettings {
    fn from_args(args: &Args) -> Self {
        Self {
            history_limit: args.history_limit,
            provider_timeout: Duration::from_secs(args.provider_timeout_secs),
            retry_backoff: Duration::from_millis(args.provider_retry_backoff_ms),
        }
    }
}

/// Orchestrates one update end to end: classification, command handling,
/// history, provider dispatch with retry and fallback, reply delivery.
pub struct BotAgent {
    chat_client: Arc<dyn ChatClient>,
    store: Arc<dyn ConversationStore>,
    messenger: Arc<dyn Messenger>,
    replies: Arc<Replies>,
    settings: DispatchSettings,
    chat_mode: Mutex<HashSet<i64>>,
}

impl BotAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_type = parse_llm_type(&args.provider_type)?;
        let api_key = if !args.provider_api_key.is_empty() {
            Some(args.provider_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type,
            base_url: args.provider_base_url.clone(),
            api_key,
            model: args.provider_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat provider configured: Type={}, Model={:?}, BaseURL={:?}",
            args.provider_type,
            chat_config.model.as_deref().unwrap_or("adapter default"),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let store = initialize_conversation_store(args)?;
        let replies = load_replies(args.replies_path.as_deref())?;
        let messenger: Arc<dyn Messenger> = Arc::new(
            TelegramClient::new(&args.telegram_api_base, &args.bot_token)
        );

        Ok(Self::from_parts(chat_client, store, messenger, replies, DispatchSettings::from_args(args)))
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        store: Arc<dyn ConversationStore>,
        messenger: Arc<dyn Messenger>,
        replies: Arc<Replies>,
        settings: DispatchSettings
    ) -> Self {
        Self {
            chat_client,
            store,
            messenger,
            replies,
            settings,
            chat_mode: Mutex::new(HashSet::new()),
        }
    }

    /// Handles one classified update. Never fails: every degradation path
    /// ends in a reply (or a silent drop for unsupported updates) so the
    /// webhook can always be acknowledged.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        match update.classify() {
            UpdateKind::Unsupported => {
                info!("Update {} is unsupported, acknowledged and dropped", update_id);
            }
            UpdateKind::Callback { callback_id, chat_id, data } => {
                self.handle_callback(&callback_id, chat_id, &data).await;
            }
            UpdateKind::Message { chat_id, username, text } => {
                if let Some(command) = Command::parse(&text) {
                    self.handle_command(chat_id, command).await;
                } else if text.trim_start().starts_with('/') {
                    // Unknown commands are dropped, never sent to the provider.
                    info!("Ignoring unknown command in chat {}", chat_id);
                } else {
                    self.ensure_chat_mode(chat_id).await;
                    if let Err(e) = self.messenger.send_typing(chat_id).await {
                        warn!("Typing indicator failed for chat {}: {}", chat_id, e);
                    }
                    let reply = self.process_message(chat_id, &username, &text).await;
                    if let Err(e) = self.messenger.send_message(chat_id, &reply, true).await {
                        warn!("Reply delivery failed for chat {}: {}", chat_id, e);
                    }
                }
            }
        }
    }

    async fn handle_command(&self, chat_id: i64, command: Command) {
        let reply = match command {
            Command::Start => self.replies.welcome.clone(),
            Command::Help => self.replies.help.clone(),
            Command::Chat => {
                self.chat_mode.lock().await.insert(chat_id);
                self.replies.chat_mode_on.clone()
            }
            Command::Reset => {
                match self.store.reset(&chat_id.to_string()).await {
                    Ok(()) => self.replies.reset_done.clone(),
                    Err(e) => {
                        warn!("Reset failed for chat {}: {}", chat_id, e);
                        self.replies.fallback.clone()
                    }
                }
            }
        };

        if let Err(e) = self.messenger.send_message(chat_id, &reply, false).await {
            warn!("Command reply delivery failed for chat {}: {}", chat_id, e);
        }
    }

    async fn handle_callback(&self, callback_id: &str, chat_id: Option<i64>, data: &str) {
        if let Err(e) = self.messenger.answer_callback(callback_id).await {
            warn!("Callback ack failed for {}: {}", callback_id, e);
        }

        let reply = match data {
            "feedback_positive" => &self.replies.feedback_thanks,
            "feedback_negative" => &self.replies.feedback_sorry,
            other => {
                info!("Ignoring unknown callback data '{}'", other);
                return;
            }
        };

        if let Some(chat_id) = chat_id {
            if let Err(e) = self.messenger.send_message(chat_id, reply, false).await {
                warn!("Feedback reply delivery failed for chat {}: {}", chat_id, e);
            }
        }
    }

    async fn ensure_chat_mode(&self, chat_id: i64) {
        let mut chat_mode = self.chat_mode.lock().await;
        if chat_mode.insert(chat_id) {
            info!("Chat mode auto-enabled for chat {}", chat_id);
        }
    }

    /// Runs one user turn through history and the provider and returns the
    /// reply text. Storage trouble degrades to best-effort context; provider
    /// trouble degrades to the fixed fallback apology. Used by both the
    /// webhook path and the REST endpoint.
    pub async fn process_message(&self, chat_id: i64, username: &str, text: &str) -> String {
        let request_id = Uuid::new_v4();
        let conversation_id = chat_id.to_string();
        info!("[{}] Processing message from {} (chat_id: {})", request_id, username, chat_id);

        let appended = match self.store.append(&conversation_id, Role::User, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] History write (user) failed: {}", request_id, BotError::Storage(e.to_string()));
                false
            }
        };

        let mut messages = match
            self.store.recent(&conversation_id, self.settings.history_limit).await
        {
            Ok(conversation) => provider_messages(&conversation),
            Err(e) => {
                warn!("[{}] History read failed: {}", request_id, BotError::Storage(e.to_string()));
                Vec::new()
            }
        };
        // Whatever the store did, the provider must see the new turn.
        if !appended || messages.is_empty() {
            messages.push(ProviderMessage {
                role: "user".to_string(),
                content: text.to_string(),
            });
        }

        let response = match self.dispatch_to_provider(request_id, &messages).await {
            Some(response) => response,
            None => {
                return self.replies.fallback.clone();
            }
        };

        if
            let Err(e) = self.store.append(
                &conversation_id,
                Role::Assistant,
                &response
            ).await
        {
            warn!("[{}] History write (assistant) failed: {}", request_id, e);
        }

        response
    }

    /// One provider call with a hard timeout, retried exactly once after a
    /// bounded backoff. `None` means both attempts failed and the caller
    /// should fall back.
    async fn dispatch_to_provider(
        &self,
        request_id: Uuid,
        messages: &[ProviderMessage]
    ) -> Option<String> {
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(self.settings.retry_backoff).await;
                info!("[{}] Retrying provider call", request_id);
            }

            let call = self.chat_client.complete(messages);
            match tokio::time::timeout(self.settings.provider_timeout, call).await {
                Ok(Ok(completion)) => {
                    return Some(completion.response);
                }
                Ok(Err(e)) => {
                    warn!(
                        "[{}] Provider call failed (attempt {}): {}",
                        request_id,
                        attempt + 1,
                        BotError::Provider(e.to_string())
                    );
                }
                Err(_) => {
                    warn!(
                        "[{}] Provider call failed (attempt {}): {}",
                        request_id,
                        attempt + 1,
                        BotError::ProviderTimeout
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryConversationStore;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    enum MockReply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct MockChatClient {
        calls: AtomicUsize,
        script: Mutex<VecDeque<MockReply>>,
    }

    impl MockChatClient {
        fn scripted(script: Vec<MockReply>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatClient for MockChatClient {
        async fn complete(
            &self,
            _messages: &[ProviderMessage]
        ) -> Result<CompletionResponse, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().await.pop_front() {
                Some(MockReply::Text(text)) =>
                    Ok(CompletionResponse { response: text.to_string() }),
                Some(MockReply::Fail) => Err("provider exploded".into()),
                Some(MockReply::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung call should be cut off by the timeout")
                }
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        chat_id: i64,
        text: String,
        keyboard: bool,
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<Sent>>,
        callbacks: Mutex<Vec<String>>,
    }

    impl RecordingMessenger {
        async fn sent(&self) -> Vec<Sent> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
            with_feedback_keyboard: bool
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.sent.lock().await.push(Sent {
                chat_id,
                text: text.to_string(),
                keyboard: with_feedback_keyboard,
            });
            Ok(())
        }

        async fn send_typing(&self, _chat_id: i64) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }

        async fn answer_callback(
            &self,
            callback_id: &str
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.callbacks.lock().await.push(callback_id.to_string());
            Ok(())
        }
    }

    struct Harness {
        agent: BotAgent,
        client: Arc<MockChatClient>,
        store: Arc<MemoryConversationStore>,
        messenger: Arc<RecordingMessenger>,
    }

    fn harness(script: Vec<MockReply>) -> Harness {
        let client = MockChatClient::scripted(script);
        let store = Arc::new(MemoryConversationStore::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let agent = BotAgent::from_parts(
            client.clone(),
            store.clone(),
            messenger.clone(),
            Arc::new(Replies::default()),
            DispatchSettings {
                history_limit: 10,
                provider_timeout: Duration::from_millis(50),
                retry_backoff: Duration::from_millis(1),
            }
        );
        Harness { agent, client, store, messenger }
    }

    fn text_update(chat_id: i64, text: &str) -> Update {
        serde_json
            ::from_value(
                serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 7,
                    "chat": { "id": chat_id },
                    "from": { "id": 9, "username": "alice" },
                    "text": text
                }
            })
            )
            .unwrap()
    }

    #[tokio::test]
    async fn start_command_replies_welcome_without_provider_call() {
        let h = harness(vec![]);
        h.agent.handle_update(text_update(42, "/start")).await;

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, Replies::default().welcome);
        assert!(!sent[0].keyboard);
        assert_eq!(h.client.call_count(), 0);
        assert!(h.store.recent("42", 10).await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn plain_message_round_trips_through_provider_and_history() {
        let h = harness(vec![MockReply::Text("hi there")]);
        h.agent.handle_update(text_update(42, "hello")).await;

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hi there");
        assert!(sent[0].keyboard);

        let conversation = h.store.recent("42", 10).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[0].content, "hello");
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert_eq!(conversation.messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn provider_timeout_twice_falls_back_without_persisting_a_reply() {
        let h = harness(vec![MockReply::Hang, MockReply::Hang]);
        h.agent.handle_update(text_update(42, "hello")).await;

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, Replies::default().fallback);
        assert_eq!(h.client.call_count(), 2);

        // Only the user turn is persisted; the apology is not history.
        let conversation = h.store.recent("42", 10).await.unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn provider_error_is_retried_once_then_succeeds() {
        let h = harness(vec![MockReply::Fail, MockReply::Text("second try")]);
        h.agent.handle_update(text_update(42, "hello")).await;

        assert_eq!(h.client.call_count(), 2);
        let sent = h.messenger.sent().await;
        assert_eq!(sent[0].text, "second try");
    }

    #[tokio::test]
    async fn reset_command_clears_history_and_confirms() {
        let h = harness(vec![MockReply::Text("hi there")]);
        h.agent.handle_update(text_update(42, "hello")).await;
        assert_eq!(h.store.recent("42", 10).await.unwrap().messages.len(), 2);

        h.agent.handle_update(text_update(42, "/reset")).await;
        assert!(h.store.recent("42", 10).await.unwrap().messages.is_empty());

        let sent = h.messenger.sent().await;
        assert_eq!(sent.last().unwrap().text, Replies::default().reset_done);
    }

    #[tokio::test]
    async fn chat_command_enables_chat_mode() {
        let h = harness(vec![]);
        h.agent.handle_update(text_update(42, "/chat")).await;

        assert!(h.agent.chat_mode.lock().await.contains(&42));
        let sent = h.messenger.sent().await;
        assert_eq!(sent[0].text, Replies::default().chat_mode_on);
    }

    #[tokio::test]
    async fn feedback_callback_is_acknowledged_and_answered() {
        let h = harness(vec![]);
        let update: Update = serde_json
            ::from_value(
                serde_json::json!({
                "update_id": 2,
                "callback_query": {
                    "id": "cb1",
                    "from": { "id": 9 },
                    "message": { "message_id": 7, "chat": { "id": 42 } },
                    "data": "feedback_negative"
                }
            })
            )
            .unwrap();
        h.agent.handle_update(update).await;

        assert_eq!(h.messenger.callbacks.lock().await.as_slice(), ["cb1"]);
        let sent = h.messenger.sent().await;
        assert_eq!(sent[0].text, Replies::default().feedback_sorry);
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_command_is_dropped_without_provider_call() {
        let h = harness(vec![]);
        h.agent.handle_update(text_update(42, "/unknown")).await;

        assert!(h.messenger.sent().await.is_empty());
        assert_eq!(h.client.call_count(), 0);
        assert!(h.store.recent("42", 10).await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn unsupported_update_has_no_side_effects() {
        let h = harness(vec![]);
        let update: Update = serde_json
            ::from_value(serde_json::json!({"update_id": 3, "edited_message": {"message_id": 7}}))
            .unwrap();
        h.agent.handle_update(update).await;

        assert!(h.messenger.sent().await.is_empty());
        assert_eq!(h.client.call_count(), 0);
    }

    #[test]
    fn command_parsing_handles_bot_mentions_and_arguments() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/reset@MyBot"), Some(Command::Reset));
        assert_eq!(Command::parse("/help now please"), Some(Command::Help));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }
}
