//! Mailbox poller — one polling pass over a single account.
//!
//! Delivery semantics are at-least-once with the unread marker as the
//! retry signal: a message is marked read only after its codes were
//! delivered, and a failed delivery leaves it unread for the next cycle.

use tracing::{debug, warn};

use crate::error::MailError;
use crate::extract::extract;
use crate::gmail::MailAccess;
use crate::store::GmailAccount;
use crate::telegram::Notifier;

/// Poll one account: list unread, extract codes, deliver, mark read.
///
/// Returns the number of notifications delivered. An error means the
/// account's pass ended early; the caller logs it and moves on to the
/// next account.
pub async fn poll_account(
    mail: &dyn MailAccess,
    notifier: &dyn Notifier,
    user_id: i64,
    account: &GmailAccount,
    fetch_limit: usize,
) -> Result<u32, MailError> {
    let message_ids = mail.list_unread(&account.tokens, fetch_limit).await?;
    if message_ids.is_empty() {
        return Ok(0);
    }

    debug!(
        account = %account.email,
        unread = message_ids.len(),
        "Processing unread messages"
    );

    let mut delivered = 0u32;

    for message_id in &message_ids {
        let message = match mail.fetch_full(&account.tokens, message_id).await {
            Ok(Some(m)) => m,
            // Deleted between list and fetch; skip, not an account failure.
            Ok(None) | Err(MailError::NotFound(_)) => {
                debug!(message = %message_id, "Message vanished between list and fetch");
                continue;
            }
            Err(e) => return Err(e),
        };

        let result = extract(&message);
        if !result.has_codes() {
            // Left unread on purpose: a follow-up or a human read may
            // still need this message on a later cycle.
            debug!(message = %message_id, subject = %result.subject, "No codes found");
            continue;
        }

        // Deliver first; mark read only on success.
        if let Err(e) = notifier
            .notify(user_id, &result.sender, &result.subject, &result.codes)
            .await
        {
            warn!(
                message = %message_id,
                user = user_id,
                "Delivery failed, leaving message unread: {e}"
            );
            continue;
        }
        delivered += 1;

        if let Err(e) = mail.mark_read(&account.tokens, message_id).await {
            // Accepted risk: a duplicate notification next cycle, never
            // a lost one.
            warn!(message = %message_id, "Could not mark message read after delivery: {e}");
        }
    }

    Ok(delivered)
}
