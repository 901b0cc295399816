//! Bot command loop — long-polls getUpdates and drives the menu through
//! which users connect and manage their mailboxes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::extract::extract;
use crate::gmail::{MailAccess, OauthClient};
use crate::store::AccountStore;
use crate::telegram::api::{CallbackQuery, TelegramApi, Update};
use crate::telegram::format_code_message;

/// Telegram bot frontend.
pub struct Bot {
    api: Arc<TelegramApi>,
    store: Arc<dyn AccountStore>,
    mail: Arc<dyn MailAccess>,
    oauth: Arc<OauthClient>,
    poll_interval: Duration,
    /// Fetch limit used by the manual /test check.
    test_fetch_limit: usize,
}

impl Bot {
    pub fn new(
        api: Arc<TelegramApi>,
        store: Arc<dyn AccountStore>,
        mail: Arc<dyn MailAccess>,
        oauth: Arc<OauthClient>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            mail,
            oauth,
            poll_interval,
            test_fetch_limit: 5,
        }
    }

    /// Spawn the update loop. Set the returned flag to stop it.
    pub fn spawn(self) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!("Telegram bot listening for commands");
            let mut offset: i64 = 0;

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    info!("Telegram bot shutting down");
                    return;
                }

                let updates = match self.api.get_updates(offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!("Telegram poll error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Err(e) = self.handle_update(update).await {
                        warn!("Failed to handle Telegram update: {e}");
                    }
                }
            }
        });

        (handle, shutdown_flag)
    }

    async fn handle_update(&self, update: Update) -> Result<(), NotifyError> {
        if let Some(message) = update.message {
            if let Some(text) = message.text.as_deref() {
                return self.handle_command(message.chat.id, text).await;
            }
        }
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }
        Ok(())
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn handle_command(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        match text.trim() {
            "/start" => {
                self.api
                    .send_with_keyboard(
                        chat_id,
                        "👋 *Hi!*\n\nI forward verification codes from your Gmail \
                         automatically.\n\n✨ Connecting an account takes *one click*.",
                        main_keyboard(),
                    )
                    .await
            }
            "/status" => self.send_status(chat_id).await,
            "/test" => self.run_manual_check(chat_id).await,
            _ => Ok(()),
        }
    }

    async fn send_status(&self, chat_id: i64) -> Result<(), NotifyError> {
        let accounts = match self.store.accounts_for_user(chat_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Status query failed for {chat_id}: {e}");
                return self.api.send_message(chat_id, "❌ Could not load status").await;
            }
        };

        let mut text = format!(
            "*📊 Bot status*\n\n👤 Telegram ID: `{chat_id}`\n📧 Connected accounts: {}\n",
            accounts.len()
        );
        if !accounts.is_empty() {
            text.push_str("\n*Accounts:*\n");
            for account in &accounts {
                text.push_str(&format!(
                    "• `{}`\n  Added: {}\n",
                    account.email,
                    account.added_at.format("%Y-%m-%d")
                ));
            }
        }
        text.push_str(&format!(
            "\n⏱ Checking every {} sec\n✅ Bot active",
            self.poll_interval.as_secs()
        ));

        self.api.send_message(chat_id, &text).await
    }

    /// Manual mailbox check (/test): extract and show codes without
    /// marking anything read, so the scheduled cycle still delivers.
    async fn run_manual_check(&self, chat_id: i64) -> Result<(), NotifyError> {
        let placeholder = self
            .api
            .send_returning_id(chat_id, "⏳ Checking your mail...", None)
            .await?;

        let accounts = match self.store.accounts_for_user(chat_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Manual check failed for {chat_id}: {e}");
                return self
                    .api
                    .edit_message(chat_id, placeholder, "❌ Could not load accounts", None)
                    .await;
            }
        };
        if accounts.is_empty() {
            return self
                .api
                .edit_message(chat_id, placeholder, "❌ No connected accounts", None)
                .await;
        }

        let mut found = 0u32;
        for account in &accounts {
            let ids = match self.mail.list_unread(&account.tokens, self.test_fetch_limit).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(account = %account.email, "Manual check failed: {e}");
                    continue;
                }
            };
            for id in &ids {
                let message = match self.mail.fetch_full(&account.tokens, id).await {
                    Ok(Some(m)) => m,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(account = %account.email, "Manual fetch failed: {e}");
                        break;
                    }
                };
                let result = extract(&message);
                if result.has_codes() {
                    found += 1;
                    let text =
                        format_code_message(&result.sender, &result.subject, &result.codes);
                    self.api.send_message(chat_id, &text).await?;
                }
            }
        }

        let summary = if found > 0 {
            format!("✅ Codes found: {found}")
        } else {
            "📭 No unread messages with codes".to_string()
        };
        self.api.edit_message(chat_id, placeholder, &summary, None).await
    }

    // ── Callbacks ───────────────────────────────────────────────────

    async fn handle_callback(&self, query: CallbackQuery) -> Result<(), NotifyError> {
        let Some(message) = query.message.as_ref() else {
            return self.api.answer_callback(&query.id, None).await;
        };
        let chat_id = message.chat.id;
        let message_id = message.message_id;

        match query.data.as_deref().unwrap_or_default() {
            "add" => {
                self.api.answer_callback(&query.id, None).await?;
                self.start_connect_flow(chat_id).await
            }
            "list" => {
                self.api.answer_callback(&query.id, None).await?;
                self.send_account_list(chat_id).await
            }
            "remove" => {
                self.api.answer_callback(&query.id, None).await?;
                self.send_remove_menu(chat_id).await
            }
            data if data.starts_with("del_") => {
                let email = data.trim_start_matches("del_");
                self.remove_account(&query, chat_id, message_id, email).await
            }
            "help" => {
                self.api.answer_callback(&query.id, None).await?;
                self.api
                    .send_with_keyboard(chat_id, HELP_TEXT, main_keyboard())
                    .await
            }
            "menu" => {
                self.api.answer_callback(&query.id, None).await?;
                self.api
                    .edit_message(
                        chat_id,
                        message_id,
                        "📋 *Main menu*\n\nPick an action:",
                        Some(main_keyboard()),
                    )
                    .await
            }
            other => {
                warn!("Unknown callback data: {other}");
                self.api.answer_callback(&query.id, None).await
            }
        }
    }

    async fn start_connect_flow(&self, chat_id: i64) -> Result<(), NotifyError> {
        // The Telegram id doubles as the OAuth state; the callback
        // resolves it back to the user.
        let state = chat_id.to_string();
        if let Err(e) = self.store.set_pending_auth(chat_id, &state).await {
            warn!("Could not record pending auth for {chat_id}: {e}");
            return self
                .api
                .send_message(chat_id, "❌ Could not create the link. Try /start")
                .await;
        }

        let url = self.oauth.consent_url(&state);
        let keyboard = serde_json::json!([[{ "text": "🔗 Connect Gmail", "url": url }]]);
        self.api
            .send_with_keyboard(
                chat_id,
                "🔐 *One step, that's all*\n\nTap the button below and allow access \
                 to Gmail.\n\n✅ No passwords to type\n✅ Fully automatic",
                keyboard,
            )
            .await
    }

    async fn send_account_list(&self, chat_id: i64) -> Result<(), NotifyError> {
        let accounts = match self.store.accounts_for_user(chat_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Account list failed for {chat_id}: {e}");
                return self.api.send_message(chat_id, "❌ Could not load accounts").await;
            }
        };

        if accounts.is_empty() {
            return self
                .api
                .send_with_keyboard(
                    chat_id,
                    "📭 You have no connected accounts.\n\nUse \"➕ Connect Gmail\".",
                    main_keyboard(),
                )
                .await;
        }

        let mut text = "*📋 Connected Gmail accounts:*\n\n".to_string();
        for (index, account) in accounts.iter().enumerate() {
            text.push_str(&format!(
                "{}. `{}`\n   Added: {}\n\n",
                index + 1,
                account.email,
                account.added_at.format("%Y-%m-%d")
            ));
        }
        self.api.send_with_keyboard(chat_id, &text, main_keyboard()).await
    }

    async fn send_remove_menu(&self, chat_id: i64) -> Result<(), NotifyError> {
        let accounts = match self.store.accounts_for_user(chat_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Remove menu failed for {chat_id}: {e}");
                return self.api.send_message(chat_id, "❌ Could not load accounts").await;
            }
        };
        if accounts.is_empty() {
            return self
                .api
                .send_with_keyboard(chat_id, "📭 No accounts to remove", main_keyboard())
                .await;
        }

        let mut rows: Vec<serde_json::Value> = accounts
            .iter()
            .enumerate()
            .map(|(index, account)| {
                serde_json::json!([{
                    "text": format!("{}. {}", index + 1, account.email),
                    "callback_data": format!("del_{}", account.email),
                }])
            })
            .collect();
        rows.push(serde_json::json!([{ "text": "« Back to menu", "callback_data": "menu" }]));

        self.api
            .send_with_keyboard(
                chat_id,
                "*Pick an account to remove:*",
                serde_json::Value::Array(rows),
            )
            .await
    }

    async fn remove_account(
        &self,
        query: &CallbackQuery,
        chat_id: i64,
        message_id: i64,
        email: &str,
    ) -> Result<(), NotifyError> {
        match self.store.remove_account(chat_id, email).await {
            Ok(_) => {
                self.api.answer_callback(&query.id, Some("✅ Account removed")).await?;
                self.api
                    .edit_message(
                        chat_id,
                        message_id,
                        &format!("✅ Account `{email}` removed."),
                        Some(main_keyboard()),
                    )
                    .await
            }
            Err(e) => {
                warn!("Could not remove {email} for {chat_id}: {e}");
                self.api.answer_callback(&query.id, Some("❌ Removal failed")).await
            }
        }
    }
}

/// The main inline-keyboard menu.
pub(crate) fn main_keyboard() -> serde_json::Value {
    serde_json::json!([
        [{ "text": "➕ Connect Gmail", "callback_data": "add" }],
        [{ "text": "📋 My accounts", "callback_data": "list" }],
        [{ "text": "❌ Remove account", "callback_data": "remove" }],
        [{ "text": "❓ Help", "callback_data": "help" }],
    ])
}

const HELP_TEXT: &str = "*❓ How it works:*\n\n\
    *1.* Tap \"➕ Connect Gmail\"\n\
    *2.* Allow access in Google (one click)\n\
    *3.* Done! Codes arrive automatically\n\n\
    *🔒 Safety:*\n\
    • The bot only sees new mail\n\
    • It cannot delete or send mail\n\
    • Access can be revoked at any time\n\n\
    *⚡️ Speed:*\n\
    Mail is checked every 30 seconds";
