pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod telegram;

use agent::BotAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use telegram::TelegramClient;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let missing = cli::missing_settings(&args);
    if !missing.is_empty() {
        return Err(format!("Missing required settings: {}", missing.join(", ")).into());
    }

    if let Some(webhook_url) = &args.set_webhook {
        let client = TelegramClient::new(&args.telegram_api_base, &args.bot_token);
        client.set_webhook(webhook_url).await?;
        return Ok(());
    }
    if args.delete_webhook {
        let client = TelegramClient::new(&args.telegram_api_base, &args.bot_token);
        client.delete_webhook().await?;
        return Ok(());
    }

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Webhook Path: {}", args.webhook_path);
    info!("Provider Type: {}", args.provider_type);
    info!("Provider Timeout: {}s (retry backoff {}ms)",
        args.provider_timeout_secs,
        args.provider_retry_backoff_ms
    );
    info!("History Store Type: {}", args.history_type);
    if !args.history_type.eq_ignore_ascii_case("memory") {
        info!("History Store Host: {}", args.history_host);
    }
    info!("History Context Window: {} turns", args.history_limit);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(BotAgent::new(&args)?);
    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(agent, args);
    server.run().await?;

    Ok(())
}
