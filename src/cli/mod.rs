use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:3000")]
    pub server_addr: String,

    /// Route path on which Telegram updates are received.
    #[arg(long, env = "WEBHOOK_PATH", default_value = "/api/chat/update")]
    pub webhook_path: String,

    // --- Telegram Args ---
    /// Telegram Bot API token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "")]
    pub bot_token: String,

    /// Base URL of the Telegram Bot API (override for testing).
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = "https://api.telegram.org")]
    pub telegram_api_base: String,

    // --- Provider Args ---
    /// Type of chat-completion provider (mistral, openai).
    #[arg(long, env = "PROVIDER_TYPE", default_value = "mistral")]
    pub provider_type: String,

    /// Base URL for the provider API (e.g. https://api.mistral.ai/v1).
    #[arg(long, env = "PROVIDER_BASE_URL")]
    pub provider_base_url: Option<String>,

    /// API key for the provider.
    #[arg(long, env = "PROVIDER_API_KEY", default_value = "")]
    pub provider_api_key: String,

    /// Model name for chat completion (e.g. mistral-medium, gpt-4o).
    #[arg(long, env = "PROVIDER_MODEL")]
    pub provider_model: Option<String>,

    /// Timeout in seconds for a single provider call. Must be shorter than
    /// any execution deadline of the hosting environment.
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "15")]
    pub provider_timeout_secs: u64,

    /// Backoff in milliseconds before the single provider retry.
    #[arg(long, env = "PROVIDER_RETRY_BACKOFF_MS", default_value = "500")]
    pub provider_retry_backoff_ms: u64,

    // --- History Store Args ---
    /// Conversation history store type (memory, redis).
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// History store endpoint (e.g. redis://127.0.0.1:6379).
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "conversation:")]
    pub history_redis_prefix: String,

    /// Number of recent turns sent to the provider as context.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "10")]
    pub history_limit: usize,

    // --- Replies Args ---
    /// Optional path to a JSON file overriding the built-in reply texts.
    #[arg(long, env = "REPLIES_PATH")]
    pub replies_path: Option<String>,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- Webhook Administration (one-shot, exits without serving) ---
    /// Register the given HTTPS URL as the bot webhook, then exit.
    #[arg(long, env = "SET_WEBHOOK_URL")]
    pub set_webhook: Option<String>,

    /// Remove the currently registered webhook, then exit.
    #[arg(long, default_value = "false")]
    pub delete_webhook: bool,
}

/// Returns the names of required settings that are missing for the
/// selected configuration.
pub fn missing_settings(args: &Args) -> Vec<&'static str> {
    let mut missing = Vec::new();

    if args.bot_token.is_empty() {
        missing.push("TELEGRAM_BOT_TOKEN");
    }

    // Webhook administration needs only the bot token.
    if args.set_webhook.is_some() || args.delete_webhook {
        return missing;
    }

    if args.provider_api_key.is_empty() {
        missing.push("PROVIDER_API_KEY");
    }
    if args.history_type.eq_ignore_ascii_case("redis") && args.history_host.is_empty() {
        missing.push("HISTORY_HOST");
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from([
            "telegram-relay",
            "--bot-token",
            "123:abc",
            "--provider-api-key",
            "key",
        ])
    }

    #[test]
    fn defaults_are_applied() {
        let args = base_args();
        assert_eq!(args.server_addr, "0.0.0.0:3000");
        assert_eq!(args.webhook_path, "/api/chat/update");
        assert_eq!(args.provider_type, "mistral");
        assert_eq!(args.history_type, "memory");
        assert_eq!(args.history_limit, 10);
    }

    #[test]
    fn missing_settings_reports_empty_token() {
        let mut args = base_args();
        args.bot_token.clear();
        assert_eq!(missing_settings(&args), vec!["TELEGRAM_BOT_TOKEN"]);
    }

    #[test]
    fn webhook_admin_does_not_require_provider_key() {
        let mut args = base_args();
        args.provider_api_key.clear();
        args.delete_webhook = true;
        assert!(missing_settings(&args).is_empty());
    }

    #[test]
    fn redis_store_requires_host() {
        let mut args = base_args();
        args.history_type = "redis".to_string();
        args.history_host.clear();
        assert_eq!(missing_settings(&args), vec!["HISTORY_HOST"]);
    }
}
