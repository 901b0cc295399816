//! Gmail integration — wire types, OAuth and the mail-access seam.

pub mod client;
pub mod oauth;
pub mod payload;

use async_trait::async_trait;

use crate::error::MailError;
use crate::gmail::oauth::OauthTokens;
use crate::gmail::payload::GmailMessage;

pub use client::GmailClient;
pub use oauth::OauthClient;

/// Mail-access collaborator consumed by the poller.
///
/// Implementations may fail with a credential-invalid, transient-network
/// or not-found condition; `fetch_full` reports not-found as `Ok(None)`.
#[async_trait]
pub trait MailAccess: Send + Sync {
    /// Unread message ids in the primary inbox, at most `limit`.
    async fn list_unread(
        &self,
        creds: &OauthTokens,
        limit: usize,
    ) -> Result<Vec<String>, MailError>;

    /// The full message, or `None` if it vanished since the list call.
    async fn fetch_full(
        &self,
        creds: &OauthTokens,
        message_id: &str,
    ) -> Result<Option<GmailMessage>, MailError>;

    /// Remove the unread marker on the mail server.
    async fn mark_read(&self, creds: &OauthTokens, message_id: &str) -> Result<(), MailError>;
}
