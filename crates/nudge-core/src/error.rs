//! Error taxonomy shared by every Nudge crate.

use thiserror::Error;

/// Errors raised by the scheduling core and its collaborators.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Record failed validation at the scheduling boundary.
    #[error("Invalid notification record: {0}")]
    InvalidRecord(String),

    /// A command was issued before `initialize()`.
    #[error("Scheduler is not initialized")]
    NotInitialized,

    /// Channel (or other keyed resource) already registered.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The platform refused or cannot perform the operation
    /// (missing permission, unsupported OS version).
    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// Durable store read/write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NudgeError>;
