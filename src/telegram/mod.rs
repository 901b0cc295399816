//! Telegram integration — notification delivery and the bot command loop.

pub mod api;
pub mod bot;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use api::TelegramApi;
pub use bot::Bot;

/// Notification-delivery collaborator consumed by the poller.
///
/// Retrying is the caller's decision; the interface does not deduplicate.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one found-code notification to a user.
    async fn notify(
        &self,
        user_id: i64,
        sender: &str,
        subject: &str,
        codes: &[String],
    ) -> Result<(), NotifyError>;
}

/// Render the found-code notification text (Telegram Markdown).
pub fn format_code_message(sender: &str, subject: &str, codes: &[String]) -> String {
    let codes = codes
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "🔑 *New verification code!*\n\n📧 From: `{sender}`\n📝 Subject: {subject}\n\n*Codes:* {codes}"
    )
}
