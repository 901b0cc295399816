//! Google OAuth — consent URL, code exchange and token refresh.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::MailError;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read + label modification (needed to mark messages read).
const SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Access tokens are treated as stale this long before actual expiry.
const EXPIRY_SLACK_SECS: i64 = 60;

/// OAuth token material for one connected mailbox.
///
/// Stored by the account store as opaque JSON; this core never writes
/// it back after the initial connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OauthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OauthTokens {
    /// Whether the access token is expired (or about to be).
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at - Duration::seconds(EXPIRY_SLACK_SECS) <= Utc::now(),
            // No expiry recorded: assume still valid, let the API 401 if not.
            None => false,
        }
    }
}

/// Wire shape of Google's token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_tokens(self, prior_refresh: Option<String>) -> OauthTokens {
        OauthTokens {
            access_token: self.access_token,
            // Google omits the refresh token on refresh responses.
            refresh_token: self.refresh_token.or(prior_refresh),
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        }
    }
}

/// OAuth client for the Google authorization endpoints.
pub struct OauthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

impl OauthClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.redirect_uri(),
        }
    }

    /// Build the consent URL a user opens to connect a mailbox.
    ///
    /// `state` round-trips through Google and identifies the user on the
    /// callback. `access_type=offline` + `prompt=consent` make Google
    /// return a refresh token.
    pub fn consent_url(&self, state: &str) -> String {
        let url = reqwest::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .expect("static auth URL is valid");
        url.into()
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<OauthTokens, MailError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let response = self.token_request(&params).await?;
        Ok(response.into_tokens(None))
    }

    /// Mint a fresh access token from a refresh token.
    pub async fn refresh(&self, tokens: &OauthTokens) -> Result<OauthTokens, MailError> {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Err(MailError::Oauth(
                "no refresh token; the account must be reconnected".to_string(),
            ));
        };
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.token_request(&params).await?;
        Ok(response.into_tokens(tokens.refresh_token.clone()))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, MailError> {
        let resp = self.client.post(TOKEN_URL).form(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Oauth(format!("token endpoint returned {status}: {body}")));
        }
        resp.json::<TokenResponse>()
            .await
            .map_err(|e| MailError::Oauth(format!("malformed token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let tokens = OauthTokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::seconds(3600)),
        };
        assert!(!tokens.is_expired());
    }

    #[test]
    fn token_inside_slack_window_counts_as_expired() {
        let tokens = OauthTokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::seconds(30)),
        };
        assert!(tokens.is_expired());
    }

    #[test]
    fn token_without_expiry_is_assumed_valid() {
        let tokens = OauthTokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!tokens.is_expired());
    }

    #[test]
    fn refresh_response_keeps_prior_refresh_token() {
        let response = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
        };
        let tokens = response.into_tokens(Some("keep-me".into()));
        assert_eq!(tokens.refresh_token.as_deref(), Some("keep-me"));
        assert!(tokens.expires_at.is_some());
    }

    #[test]
    fn tokens_round_trip_through_json() {
        let tokens = OauthTokens {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&tokens).unwrap();
        let parsed: OauthTokens = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tokens);
    }
}
