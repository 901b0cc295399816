//! HTTP server — the OAuth callback that completes the authorization
//! handshake, plus health endpoints.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::gmail::{GmailClient, OauthClient};
use crate::store::{AccountStore, GmailAccount};
use crate::telegram::TelegramApi;
use crate::telegram::bot::main_keyboard;

/// Shared handles for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub oauth: Arc<OauthClient>,
    pub gmail: Arc<GmailClient>,
    pub telegram: Arc<TelegramApi>,
}

/// Build the HTTP router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/oauth/callback", get(oauth_callback))
        .with_state(state)
}

async fn root() -> &'static str {
    "✅ Code Relay is running!"
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    if params.error.is_some() {
        return error_page(
            "Access denied",
            "You declined Gmail access. Close this window and try again in the bot.",
        );
    }
    let (Some(code), Some(auth_state)) = (params.code.as_deref(), params.state.as_deref()) else {
        return error_page("Error", "Invalid callback parameters.");
    };

    let user_id = match state.store.take_pending_auth(auth_state).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            return error_page("Error", "Unknown request. Start over from the bot.");
        }
        Err(e) => {
            error!("Pending-auth lookup failed: {e}");
            return error_page("Error", "Something went wrong. Try again in the bot.");
        }
    };

    match connect_account(&state, user_id, code).await {
        Ok(email) => {
            info!(user = user_id, account = %email, "Gmail account connected");
            success_page(&email)
        }
        Err(e) => {
            error!(user = user_id, "OAuth callback failed: {e}");
            error_page("Error", "Could not connect the account. Try again in the bot.")
        }
    }
}

/// Exchange the code, resolve the mailbox profile, persist the account
/// and tell the user on Telegram. Returns the connected address.
async fn connect_account(
    state: &AppState,
    user_id: i64,
    code: &str,
) -> Result<String, crate::error::Error> {
    let tokens = state.oauth.exchange_code(code).await?;
    let profile = state.gmail.fetch_profile(&tokens).await?;
    let email = profile.email_address.clone();

    state
        .store
        .add_account(
            user_id,
            GmailAccount {
                email: email.clone(),
                tokens,
                history_id: profile.history_id,
                added_at: Utc::now(),
            },
        )
        .await?;

    let text = format!(
        "✅ *Gmail connected!*\n\n📧 Account: `{email}`\n\n\
         Verification codes will now arrive here automatically."
    );
    state
        .telegram
        .send_with_keyboard(user_id, &text, main_keyboard())
        .await?;

    Ok(email)
}

fn success_page(email: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Connected</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; display: flex; justify-content: center;\n\
                 align-items: center; min-height: 100vh; margin: 0; background: #2b2d42;\n\
                 color: white; }}\n\
         .card {{ text-align: center; padding: 40px; background: #3c3f58;\n\
                  border-radius: 16px; max-width: 480px; }}\n\
         .email {{ background: #565a7d; padding: 12px; border-radius: 8px;\n\
                   margin: 20px 0; word-break: break-all; }}\n\
         </style>\n</head>\n<body>\n<div class=\"card\">\n\
         <h1>✅ Connected!</h1>\n\
         <p>This Gmail account is now linked to the Telegram bot:</p>\n\
         <div class=\"email\">{email}</div>\n\
         <p>Verification codes will arrive automatically.</p>\n\
         <p><small>You can close this window.</small></p>\n\
         </div>\n<script>setTimeout(() => {{ window.close(); }}, 5000);</script>\n\
         </body>\n</html>"
    ))
}

fn error_page(title: &str, message: &str) -> Html<String> {
    Html(format!("<h1>❌ {title}</h1><p>{message}</p>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_page_embeds_the_address() {
        let Html(page) = success_page("user@example.com");
        assert!(page.contains("user@example.com"));
        assert!(page.contains("Connected"));
    }

    #[test]
    fn error_page_carries_title_and_message() {
        let Html(page) = error_page("Access denied", "try again");
        assert!(page.contains("Access denied"));
        assert!(page.contains("try again"));
    }
}
