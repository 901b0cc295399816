//! Error types for Code Relay.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Account-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail-access errors.
///
/// The poller only distinguishes `NotFound` (a message deleted between
/// list and fetch); everything else ends the account's pass for the
/// current cycle and is retried from scratch on the next one.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Credential rejected by mail server: {0}")]
    CredentialInvalid(String),

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Rate limited by mail server")]
    RateLimited,

    #[error("Mail API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("OAuth error: {0}")]
    Oauth(String),
}

impl From<reqwest::Error> for MailError {
    fn from(e: reqwest::Error) -> Self {
        MailError::Network(e.to_string())
    }
}

/// Notification-delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Telegram API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Network(e.to_string())
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
