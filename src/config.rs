//! Service configuration, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Runtime configuration for the relay.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token.
    pub telegram_bot_token: String,
    /// Google OAuth client id.
    pub google_client_id: String,
    /// Google OAuth client secret.
    pub google_client_secret: SecretString,
    /// Public base URL of this service (for the OAuth redirect).
    pub public_url: String,
    /// HTTP listen port.
    pub http_port: u16,
    /// SQLite database path.
    pub db_path: String,
    /// Fixed interval between poll cycles.
    pub poll_interval: Duration,
    /// Delay before the first poll cycle after startup.
    pub first_poll_delay: Duration,
    /// Maximum unread messages fetched per account per cycle.
    pub fetch_limit: usize,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// `TELEGRAM_BOT_TOKEN`, `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`
    /// and `RELAY_PUBLIC_URL` are required; everything else has defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = require_var("TELEGRAM_BOT_TOKEN")?;
        let google_client_id = require_var("GOOGLE_CLIENT_ID")?;
        let google_client_secret = SecretString::from(require_var("GOOGLE_CLIENT_SECRET")?);
        let public_url = require_var("RELAY_PUBLIC_URL")?;

        let http_port = parsed_var("PORT", 3000)?;
        let db_path =
            std::env::var("RELAY_DB_PATH").unwrap_or_else(|_| "./data/code-relay.db".to_string());

        let poll_interval = Duration::from_secs(parsed_var("RELAY_POLL_INTERVAL_SECS", 30u64)?);
        let first_poll_delay =
            Duration::from_secs(parsed_var("RELAY_FIRST_POLL_DELAY_SECS", 10u64)?);
        let fetch_limit = parsed_var("RELAY_FETCH_LIMIT", 10usize)?;
        let request_timeout = Duration::from_secs(parsed_var("RELAY_REQUEST_TIMEOUT_SECS", 20u64)?);

        Ok(Self {
            telegram_bot_token,
            google_client_id,
            google_client_secret,
            public_url,
            http_port,
            db_path,
            poll_interval,
            first_poll_delay,
            fetch_limit,
            request_timeout,
        })
    }

    /// The OAuth redirect URI registered with Google.
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth/callback", self.public_url.trim_end_matches('/'))
    }
}

fn require_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
    }
}
