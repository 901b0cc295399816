//! Text normalizer — flattens a message payload tree into one text buffer.
//!
//! Plain-text parts are always used; HTML is a fallback that only kicks
//! in when the whole visited tree contained no plain text. Decoding
//! failures contribute nothing — normalization never fails.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;

use crate::gmail::payload::MessagePart;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Produce the normalized text for a payload tree.
///
/// A leaf payload (no child parts) is decoded directly and assumed to be
/// plain text. Otherwise top-level parts plus one nested level are
/// visited: plain-text bodies are appended in visitation order, and the
/// first HTML body (stripped of markup) is kept aside, used only if no
/// plain text was found anywhere.
pub fn normalize(payload: &MessagePart) -> String {
    if payload.parts.is_empty() {
        return payload
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .and_then(decode_body)
            .unwrap_or_default();
    }

    let mut text = String::new();
    let mut html_fallback = String::new();

    for part in &payload.parts {
        visit(part, &mut text, &mut html_fallback);
        // Message shapes this system targets nest at most one level deep.
        for nested in &part.parts {
            visit(nested, &mut text, &mut html_fallback);
        }
    }

    if text.is_empty() { html_fallback } else { text }
}

fn visit(part: &MessagePart, text: &mut String, html_fallback: &mut String) {
    let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) else {
        return;
    };

    match part.mime_type.as_str() {
        "text/plain" => {
            if let Some(decoded) = decode_body(data) {
                text.push_str(&decoded);
            }
        }
        "text/html" if html_fallback.is_empty() => {
            if let Some(decoded) = decode_body(data) {
                html_fallback.push_str(&strip_html(&decoded));
            }
        }
        _ => {}
    }
}

/// Decode a base64url-encoded body into UTF-8 text.
///
/// Gmail emits the URL-safe alphabet, sometimes padded; padding is
/// stripped before decoding.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}

/// Replace every `<...>` span with a space and collapse runs of
/// whitespace into one.
fn strip_html(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn plain_part(text: &str) -> MessagePart {
        part("text/plain", text)
    }

    fn html_part(html: &str) -> MessagePart {
        part("text/html", html)
    }

    fn part(mime_type: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: mime_type.to_string(),
            body: Some(crate::gmail::payload::PartBody {
                data: Some(encode(text)),
                size: text.len() as i64,
            }),
            ..Default::default()
        }
    }

    fn container(parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: "multipart/alternative".to_string(),
            parts,
            ..Default::default()
        }
    }

    #[test]
    fn leaf_body_is_decoded_directly() {
        assert_eq!(normalize(&plain_part("Your code: 482913")), "Your code: 482913");
    }

    #[test]
    fn plain_parts_are_concatenated_in_order() {
        let payload = container(vec![plain_part("first "), plain_part("second")]);
        assert_eq!(normalize(&payload), "first second");
    }

    #[test]
    fn html_is_ignored_when_plain_text_exists() {
        let payload = container(vec![
            plain_part("the text"),
            html_part("<p>html <b>copy</b></p>"),
        ]);
        assert_eq!(normalize(&payload), "the text");
    }

    #[test]
    fn html_before_plain_still_loses() {
        // Fallback choice is independent of part order.
        let payload = container(vec![
            html_part("<p>html copy</p>"),
            plain_part("the text"),
        ]);
        assert_eq!(normalize(&payload), "the text");
    }

    #[test]
    fn html_only_is_stripped_and_collapsed() {
        let payload = container(vec![html_part("<div>\n  code:   <b>9471</b>\n</div>")]);
        let out = normalize(&payload);
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert!(!out.contains("  "), "whitespace not collapsed: {out:?}");
        assert!(out.contains("code: 9471"));
    }

    #[test]
    fn only_first_html_part_is_used() {
        let payload = container(vec![html_part("<p>one</p>"), html_part("<p>two</p>")]);
        assert_eq!(normalize(&payload).trim(), "one");
    }

    #[test]
    fn nested_parts_are_visited_one_level_deep() {
        let payload = container(vec![container(vec![plain_part("nested text")])]);
        assert_eq!(normalize(&payload), "nested text");
    }

    #[test]
    fn invalid_base64_contributes_nothing() {
        let mut bad = plain_part("ignored");
        bad.body = Some(crate::gmail::payload::PartBody {
            data: Some("!!! not base64 !!!".to_string()),
            size: 0,
        });
        let payload = container(vec![bad, plain_part("good")]);
        assert_eq!(normalize(&payload), "good");
    }

    #[test]
    fn empty_payload_yields_empty_text() {
        assert_eq!(normalize(&MessagePart::default()), "");
    }

    #[test]
    fn padded_base64_decodes() {
        let mut p = plain_part("");
        p.body = Some(crate::gmail::payload::PartBody {
            // "hi" URL-safe encoded with padding
            data: Some("aGk=".to_string()),
            size: 2,
        });
        assert_eq!(normalize(&p), "hi");
    }
}
