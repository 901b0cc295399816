//! Account store — users, their connected mailboxes, pending auth states.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::gmail::oauth::OauthTokens;

pub use sqlite::SqliteStore;

/// One connected mailbox.
#[derive(Debug, Clone)]
pub struct GmailAccount {
    pub email: String,
    /// Credential material; opaque to the polling core.
    pub tokens: OauthTokens,
    /// Opaque mailbox change-stream checkpoint, recorded at connect time.
    pub history_id: String,
    pub added_at: DateTime<Utc>,
}

/// A mailbox together with its owning Telegram user.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user_id: i64,
    pub account: GmailAccount,
}

/// Persistence seam for users and their mailboxes.
///
/// Read-only from the polling core's perspective; writes happen on the
/// bot/OAuth path. Additions and removals between cycles are reflected
/// because every cycle re-reads the full list.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Every account of every user — the snapshot one poll cycle runs over.
    async fn list_all_accounts(&self) -> Result<Vec<UserAccount>, StoreError>;

    /// Accounts belonging to one user.
    async fn accounts_for_user(&self, user_id: i64) -> Result<Vec<GmailAccount>, StoreError>;

    /// Persist a newly connected mailbox (replacing a prior connection of
    /// the same address for the same user).
    async fn add_account(&self, user_id: i64, account: GmailAccount) -> Result<(), StoreError>;

    /// Remove a mailbox. Returns whether anything was deleted.
    async fn remove_account(&self, user_id: i64, email: &str) -> Result<bool, StoreError>;

    /// Remember an in-flight OAuth state for a user.
    async fn set_pending_auth(&self, user_id: i64, state: &str) -> Result<(), StoreError>;

    /// Resolve and consume an OAuth state. Returns the owning user, if any;
    /// a second call with the same state returns `None`.
    async fn take_pending_auth(&self, state: &str) -> Result<Option<i64>, StoreError>;
}
