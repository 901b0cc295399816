//! SQLite-backed account store.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::{AccountStore, GmailAccount, UserAccount};

/// Account store wrapping a SQLite connection behind a Mutex.
///
/// rusqlite `Connection` is `!Sync`, so all access is serialized. The
/// workload is a handful of tiny queries per poll cycle.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        info!(path = %path.display(), "Account store opened");
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                user_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                tokens TEXT NOT NULL,
                history_id TEXT NOT NULL DEFAULT '',
                added_at TEXT NOT NULL,
                PRIMARY KEY (user_id, email)
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

            CREATE TABLE IF NOT EXISTS pending_auth (
                state TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

fn row_to_account(
    email: String,
    tokens_json: String,
    history_id: String,
    added_at: String,
) -> Result<GmailAccount, StoreError> {
    let tokens = serde_json::from_str(&tokens_json)
        .map_err(|e| StoreError::Decode(format!("tokens for {email}: {e}")))?;
    let added_at = added_at
        .parse::<DateTime<Utc>>()
        .map_err(|e| StoreError::Decode(format!("added_at for {email}: {e}")))?;
    Ok(GmailAccount { email, tokens, history_id, added_at })
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn list_all_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, email, tokens, history_id, added_at
             FROM accounts ORDER BY user_id, added_at",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (user_id, email, tokens, history_id, added_at) = row?;
            accounts.push(UserAccount {
                user_id,
                account: row_to_account(email, tokens, history_id, added_at)?,
            });
        }
        Ok(accounts)
    }

    async fn accounts_for_user(&self, user_id: i64) -> Result<Vec<GmailAccount>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT email, tokens, history_id, added_at
             FROM accounts WHERE user_id = ?1 ORDER BY added_at",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (email, tokens, history_id, added_at) = row?;
            accounts.push(row_to_account(email, tokens, history_id, added_at)?);
        }
        Ok(accounts)
    }

    async fn add_account(&self, user_id: i64, account: GmailAccount) -> Result<(), StoreError> {
        let tokens = serde_json::to_string(&account.tokens)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        self.conn().execute(
            "INSERT OR REPLACE INTO accounts (user_id, email, tokens, history_id, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                account.email,
                tokens,
                account.history_id,
                account.added_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn remove_account(&self, user_id: i64, email: &str) -> Result<bool, StoreError> {
        let deleted = self.conn().execute(
            "DELETE FROM accounts WHERE user_id = ?1 AND email = ?2",
            params![user_id, email],
        )?;
        Ok(deleted > 0)
    }

    async fn set_pending_auth(&self, user_id: i64, state: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO pending_auth (state, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![state, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn take_pending_auth(&self, state: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn();
        let user_id = conn
            .query_row(
                "SELECT user_id FROM pending_auth WHERE state = ?1",
                [state],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if user_id.is_some() {
            conn.execute("DELETE FROM pending_auth WHERE state = ?1", [state])?;
        }
        Ok(user_id)
    }
}
