use crate::application::focus_cycle::CycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Timer error: {0}")]
    Cycle(#[from] CycleError),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}
