//! Polling scheduler — drives poll cycles over every account of every user.
//!
//! A single timer fires the cycle; accounts are processed sequentially
//! over a snapshot taken at cycle start, and one account's failure never
//! reaches another account or the timer itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::gmail::MailAccess;
use crate::poller::poll_account;
use crate::store::AccountStore;
use crate::telegram::Notifier;

/// Collaborator handles the scheduler runs cycles against.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub store: Arc<dyn AccountStore>,
    pub mail: Arc<dyn MailAccess>,
    pub notifier: Arc<dyn Notifier>,
}

/// Spawn the background polling task.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop
/// polling after the current cycle. Ticks do not overlap: a slow cycle
/// delays the next tick.
pub fn spawn_scheduler(
    interval: Duration,
    first_delay: Duration,
    fetch_limit: usize,
    deps: SchedulerDeps,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            "Mail poller started — checking every {}s (first check in {}s)",
            interval.as_secs(),
            first_delay.as_secs()
        );

        tokio::time::sleep(first_delay).await;

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick resolves immediately, so the first cycle
            // runs right after the startup delay.
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Mail poller shutting down");
                return;
            }

            run_cycle(&deps, fetch_limit).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run a single poll cycle over a fresh snapshot of all accounts.
///
/// Never fails: every error is logged at the account (or cycle) boundary
/// so the timer always fires again.
pub async fn run_cycle(deps: &SchedulerDeps, fetch_limit: usize) {
    let accounts = match deps.store.list_all_accounts().await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("Could not enumerate accounts, skipping cycle: {e}");
            return;
        }
    };

    if accounts.is_empty() {
        return;
    }
    debug!(accounts = accounts.len(), "Poll cycle started");

    for entry in &accounts {
        match poll_account(
            deps.mail.as_ref(),
            deps.notifier.as_ref(),
            entry.user_id,
            &entry.account,
            fetch_limit,
        )
        .await
        {
            Ok(0) => {}
            Ok(delivered) => info!(
                user = entry.user_id,
                account = %entry.account.email,
                delivered,
                "Delivered verification codes"
            ),
            // Account-local failure; the rest of the cycle proceeds.
            Err(e) => warn!(
                user = entry.user_id,
                account = %entry.account.email,
                "Account poll failed: {e}"
            ),
        }
    }

    debug!("Poll cycle finished");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Utc;

    use super::*;
    use crate::error::{MailError, NotifyError};
    use crate::gmail::oauth::OauthTokens;
    use crate::gmail::payload::{GmailMessage, Header, MessagePart, PartBody};
    use crate::store::{GmailAccount, SqliteStore};

    fn account(email: &str, access_token: &str) -> GmailAccount {
        GmailAccount {
            email: email.to_string(),
            tokens: OauthTokens {
                access_token: access_token.to_string(),
                refresh_token: None,
                expires_at: None,
            },
            history_id: "1".into(),
            added_at: Utc::now(),
        }
    }

    fn code_message(id: &str, code: &str) -> GmailMessage {
        let body = format!("Your code: {code}");
        GmailMessage {
            id: id.to_string(),
            snippet: String::new(),
            payload: Some(MessagePart {
                mime_type: "text/plain".into(),
                headers: vec![Header { name: "From".into(), value: "svc@example.com".into() }],
                body: Some(PartBody {
                    data: Some(URL_SAFE_NO_PAD.encode(body.as_bytes())),
                    size: body.len() as i64,
                }),
                parts: vec![],
            }),
        }
    }

    /// Mail access keyed on the access token: `broken` accounts fail on
    /// list, everyone else has exactly one code-bearing unread message.
    struct PerAccountMail {
        broken_token: String,
    }

    #[async_trait]
    impl MailAccess for PerAccountMail {
        async fn list_unread(
            &self,
            creds: &OauthTokens,
            _limit: usize,
        ) -> Result<Vec<String>, MailError> {
            if creds.access_token == self.broken_token {
                return Err(MailError::Network("connection reset".into()));
            }
            Ok(vec!["m1".into()])
        }

        async fn fetch_full(
            &self,
            _creds: &OauthTokens,
            message_id: &str,
        ) -> Result<Option<GmailMessage>, MailError> {
            Ok(Some(code_message(message_id, "918273")))
        }

        async fn mark_read(
            &self,
            _creds: &OauthTokens,
            _message_id: &str,
        ) -> Result<(), MailError> {
            Ok(())
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            user_id: i64,
            _sender: &str,
            _subject: &str,
            _codes: &[String],
        ) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_account_does_not_block_others() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.add_account(1, account("broken@example.com", "bad")).await.unwrap();
        store.add_account(2, account("healthy@example.com", "good")).await.unwrap();

        let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) });
        let deps = SchedulerDeps {
            store,
            mail: Arc::new(PerAccountMail { broken_token: "bad".into() }),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        };

        run_cycle(&deps, 10).await;

        // User 2 was still polled and notified despite user 1's failure.
        assert_eq!(*notifier.sent.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn empty_store_cycle_is_a_no_op() {
        let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) });
        let deps = SchedulerDeps {
            store: Arc::new(SqliteStore::open_in_memory().unwrap()),
            mail: Arc::new(PerAccountMail { broken_token: String::new() }),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        };

        run_cycle(&deps, 10).await;
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduler_task_stops_on_shutdown_flag() {
        let deps = SchedulerDeps {
            store: Arc::new(SqliteStore::open_in_memory().unwrap()),
            mail: Arc::new(PerAccountMail { broken_token: String::new() }),
            notifier: Arc::new(RecordingNotifier { sent: Mutex::new(Vec::new()) }),
        };

        let (handle, shutdown) = spawn_scheduler(
            Duration::from_millis(5),
            Duration::from_millis(0),
            10,
            deps,
        );
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
