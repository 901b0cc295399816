//! Telegram Bot API client — sendMessage, getUpdates long-polling,
//! callback handling.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::NotifyError;
use crate::telegram::{Notifier, format_code_message};

// ── Update wire types ───────────────────────────────────────────────

/// One update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

/// An incoming chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default = "default_ok")]
    ok: bool,
    result: Option<T>,
}

fn default_ok() -> bool {
    false
}

// ── Client ──────────────────────────────────────────────────────────

/// Telegram Bot API client.
pub struct TelegramApi {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(bot_token: String, client: reqwest::Client) -> Self {
        Self { bot_token, client }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, NotifyError> {
        let resp = self.client.post(self.api_url(method)).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    /// Send a text message, trying Markdown first with plain-text fallback
    /// (Telegram rejects the whole message on a Markdown parse error).
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.send_returning_id(chat_id, text, None).await.map(|_| ())
    }

    /// Send a text message with an inline keyboard.
    pub async fn send_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.send_returning_id(chat_id, text, Some(keyboard)).await.map(|_| ())
    }

    /// Send a message and return its id (for later edits).
    pub async fn send_returning_id(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<serde_json::Value>,
    ) -> Result<i64, NotifyError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(ref kb) = keyboard {
            markdown_body["reply_markup"] = serde_json::json!({ "inline_keyboard": kb });
        }

        match self.post("sendMessage", &markdown_body).await {
            Ok(resp) => return Ok(message_id_of(resp).await),
            Err(e) => {
                warn!("Telegram sendMessage with Markdown failed, retrying plain: {e}");
            }
        }

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            plain_body["reply_markup"] = serde_json::json!({ "inline_keyboard": kb });
        }
        let resp = self.post("sendMessage", &plain_body).await?;
        Ok(message_id_of(resp).await)
    }

    /// Replace the text (and keyboard) of a previously sent message.
    pub async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<serde_json::Value>,
    ) -> Result<(), NotifyError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::json!({ "inline_keyboard": kb });
        }
        self.post("editMessageText", &body).await?;
        Ok(())
    }

    /// Acknowledge a callback query (stops the client's spinner).
    pub async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), NotifyError> {
        let mut body = serde_json::json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = serde_json::Value::String(text.to_string());
        }
        self.post("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, NotifyError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": 30,
            "allowed_updates": ["message", "callback_query"],
        });
        let resp = self.post("getUpdates", &body).await?;
        let parsed: ApiResponse<Vec<Update>> = resp
            .json()
            .await
            .map_err(|e| NotifyError::Network(format!("malformed getUpdates response: {e}")))?;
        if !parsed.ok {
            return Err(NotifyError::Api { status: 200, body: "ok=false".into() });
        }
        Ok(parsed.result.unwrap_or_default())
    }
}

/// Pull `result.message_id` out of a sendMessage response; 0 when absent.
async fn message_id_of(resp: reqwest::Response) -> i64 {
    let parsed: Option<ApiResponse<Message>> = resp.json().await.ok();
    parsed
        .and_then(|r| r.result)
        .map(|m| m.message_id)
        .unwrap_or(0)
}

#[async_trait]
impl Notifier for TelegramApi {
    async fn notify(
        &self,
        user_id: i64,
        sender: &str,
        subject: &str,
        codes: &[String],
    ) -> Result<(), NotifyError> {
        let text = format_code_message(sender, subject, codes);
        self.send_message(user_id, &text).await
    }
}
