use thiserror::Error;

/// Failure classes for update handling. Only `InvalidPayload` surfaces to
/// the webhook caller (as a 400); the rest degrade inside the agent.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("provider request timed out")]
    ProviderTimeout,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("storage unavailable: {0}")]
    Storage(String),
}
