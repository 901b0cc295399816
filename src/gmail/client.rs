//! Gmail REST client — the mail-access collaborator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MailError;
use crate::gmail::MailAccess;
use crate::gmail::oauth::{OauthClient, OauthTokens};
use crate::gmail::payload::{GmailMessage, MessageList, Profile};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail API client over reqwest.
///
/// Stateless between calls: credentials come in per request, and access
/// tokens refreshed mid-call are used transiently — persisting refreshed
/// material is the account store's concern, not this client's.
pub struct GmailClient {
    client: reqwest::Client,
    oauth: Arc<OauthClient>,
}

impl GmailClient {
    pub fn new(oauth: Arc<OauthClient>, client: reqwest::Client) -> Self {
        Self { client, oauth }
    }

    /// Fetch the profile of the authorized mailbox (address + initial
    /// history id), used when an account is first connected.
    pub async fn fetch_profile(&self, creds: &OauthTokens) -> Result<Profile, MailError> {
        let bearer = self.bearer(creds).await?;
        let resp = self
            .client
            .get(format!("{GMAIL_API}/profile"))
            .bearer_auth(&bearer)
            .send()
            .await?;
        let resp = check_status(resp, "profile").await?;
        Ok(resp.json::<Profile>().await?)
    }

    /// Resolve a usable access token, refreshing if stale.
    async fn bearer(&self, creds: &OauthTokens) -> Result<String, MailError> {
        if creds.is_expired() {
            let refreshed = self.oauth.refresh(creds).await?;
            return Ok(refreshed.access_token);
        }
        Ok(creds.access_token.clone())
    }
}

/// Map a non-success response onto the mail error taxonomy.
async fn check_status(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, MailError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => MailError::CredentialInvalid(format!("{what} returned {status}")),
        404 => MailError::NotFound(what.to_string()),
        429 => MailError::RateLimited,
        code => MailError::Api { status: code, body },
    })
}

#[async_trait]
impl MailAccess for GmailClient {
    async fn list_unread(
        &self,
        creds: &OauthTokens,
        limit: usize,
    ) -> Result<Vec<String>, MailError> {
        let bearer = self.bearer(creds).await?;
        let resp = self
            .client
            .get(format!("{GMAIL_API}/messages"))
            .bearer_auth(&bearer)
            .query(&[
                ("maxResults", limit.to_string().as_str()),
                ("labelIds", "INBOX"),
                ("q", "is:unread"),
            ])
            .send()
            .await?;
        let resp = check_status(resp, "messages.list").await?;
        let list = resp.json::<MessageList>().await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch_full(
        &self,
        creds: &OauthTokens,
        message_id: &str,
    ) -> Result<Option<GmailMessage>, MailError> {
        let bearer = self.bearer(creds).await?;
        let resp = self
            .client
            .get(format!("{GMAIL_API}/messages/{message_id}"))
            .bearer_auth(&bearer)
            .query(&[("format", "full")])
            .send()
            .await?;
        match check_status(resp, "messages.get").await {
            Ok(resp) => Ok(Some(resp.json::<GmailMessage>().await?)),
            // Deleted between list and fetch; not an account failure.
            Err(MailError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn mark_read(&self, creds: &OauthTokens, message_id: &str) -> Result<(), MailError> {
        let bearer = self.bearer(creds).await?;
        let resp = self
            .client
            .post(format!("{GMAIL_API}/messages/{message_id}/modify"))
            .bearer_auth(&bearer)
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await?;
        check_status(resp, "messages.modify").await?;
        Ok(())
    }
}
