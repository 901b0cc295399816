//! Gmail REST wire types — the `full`-format message payload tree.
//!
//! The shape is dictated by the Gmail API: a message carries a tree of
//! MIME parts, each with a type, an optional base64url-encoded body and
//! optional child parts. This core treats it as given.

use serde::Deserialize;

/// A full Gmail message as returned by `messages.get?format=full`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    /// Short plain-text preview supplied by the server.
    #[serde(default)]
    pub snippet: String,
    pub payload: Option<MessagePart>,
}

impl GmailMessage {
    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    pub fn sender(&self) -> &str {
        self.header("From").unwrap_or_default()
    }
}

/// One MIME part of a message payload tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    /// Child parts; present on multipart containers only.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A single message header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A part body; `data` is base64url-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    pub data: Option<String>,
    #[serde(default)]
    pub size: i64,
}

/// Response of `messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// A message reference from `messages.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
}

/// Response of `users.getProfile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
    /// Opaque checkpoint into the mailbox's change stream.
    #[serde(default)]
    pub history_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let message: GmailMessage = serde_json::from_str(
            r#"{
                "id": "m1",
                "snippet": "preview",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [
                        {"name": "Subject", "value": "Hello"},
                        {"name": "From", "value": "a@example.com"}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(message.header("subject"), Some("Hello"));
        assert_eq!(message.sender(), "a@example.com");
        assert_eq!(message.snippet, "preview");
    }

    #[test]
    fn missing_payload_yields_empty_headers() {
        let message: GmailMessage = serde_json::from_str(r#"{"id": "m2"}"#).unwrap();
        assert_eq!(message.subject(), "");
        assert_eq!(message.sender(), "");
    }

    #[test]
    fn message_list_without_messages_field_is_empty() {
        let list: MessageList = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(list.messages.is_empty());
    }

    #[test]
    fn nested_parts_deserialize() {
        let part: MessagePart = serde_json::from_str(
            r#"{
                "mimeType": "multipart/alternative",
                "parts": [
                    {"mimeType": "text/plain", "body": {"data": "aGk", "size": 2}},
                    {"mimeType": "text/html", "body": {"data": "PGI-aGk8L2I-", "size": 12}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(part.parts.len(), 2);
        assert_eq!(part.parts[0].mime_type, "text/plain");
    }
}
