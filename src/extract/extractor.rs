//! Code extractor — runs the matcher table over normalized message text.

use std::collections::HashSet;

use crate::extract::normalize::normalize;
use crate::extract::patterns::PATTERNS;
use crate::gmail::payload::GmailMessage;

/// The result of extracting codes from one message.
///
/// Built fresh per message and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Surviving candidate codes, first-seen order, deduplicated.
    pub codes: Vec<String>,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
}

impl Extraction {
    pub fn has_codes(&self) -> bool {
        !self.codes.is_empty()
    }
}

/// Extract verification codes from a full message.
///
/// A message without a payload, with undecodable bodies or with missing
/// headers yields an empty `Extraction` — this never fails, so one bad
/// message cannot abort a poll cycle.
pub fn extract(message: &GmailMessage) -> Extraction {
    let Some(payload) = message.payload.as_ref() else {
        return Extraction::default();
    };

    let text = normalize(payload);

    Extraction {
        codes: scan(&text),
        subject: message.subject().to_string(),
        sender: message.sender().to_string(),
        snippet: message.snippet.clone(),
    }
}

/// Run every matcher over the text; collect all matches of each,
/// dedup by exact string, filter low-information tokens.
pub fn scan(text: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();

    for pattern in PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let Some(token) = caps.get(1) else { continue };
            let token = token.as_str();
            if has_distinct_chars(token) && !codes.iter().any(|c| c == token) {
                codes.push(token.to_string());
            }
        }
    }

    // Re-applied on output; the filter is idempotent.
    codes.retain(|c| has_distinct_chars(c));
    codes
}

/// A token with a single distinct character ("0000", "AAAA") is
/// boilerplate noise, not a code.
fn has_distinct_chars(token: &str) -> bool {
    token.chars().collect::<HashSet<_>>().len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::payload::{Header, MessagePart, PartBody};
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn message_with_text(text: &str) -> GmailMessage {
        GmailMessage {
            id: "m1".into(),
            snippet: "preview".into(),
            payload: Some(MessagePart {
                mime_type: "text/plain".into(),
                headers: vec![
                    Header { name: "Subject".into(), value: "Verify".into() },
                    Header { name: "From".into(), value: "no-reply@example.com".into() },
                ],
                body: Some(PartBody {
                    data: Some(URL_SAFE_NO_PAD.encode(text.as_bytes())),
                    size: text.len() as i64,
                }),
                parts: vec![],
            }),
        }
    }

    #[test]
    fn labeled_digit_code_is_found() {
        let codes = scan("Your verification code: 482913");
        assert!(codes.contains(&"482913".to_string()));
    }

    #[test]
    fn repeated_digit_token_is_filtered() {
        let codes = scan("pin: 0000");
        assert!(!codes.contains(&"0000".to_string()));
    }

    #[test]
    fn repeated_letter_token_is_filtered() {
        let codes = scan("code: AAAA");
        assert!(!codes.contains(&"AAAA".to_string()));
    }

    #[test]
    fn same_token_from_two_matchers_appears_once() {
        let codes = scan("token: AB12CD and code: AB12CD");
        assert_eq!(codes.iter().filter(|c| *c == "AB12CD").count(), 1);
    }

    #[test]
    fn localized_label_is_found() {
        let codes = scan("код подтверждения: 773210");
        assert!(codes.contains(&"773210".to_string()));
    }

    #[test]
    fn all_matches_of_one_pattern_contribute() {
        let codes = scan("first 482913 then 910284 done");
        assert!(codes.contains(&"482913".to_string()));
        assert!(codes.contains(&"910284".to_string()));
    }

    #[test]
    fn scan_is_idempotent() {
        let text = "code: AB12CD, pin: 4821, token: 4821";
        let first = scan(text);
        let second = scan(text);
        assert_eq!(first, second);
    }

    #[test]
    fn no_surviving_code_has_fewer_than_two_distinct_chars() {
        let text = "0000 1111 482913 AAAA code: BBBB token: Z9Z9Z9";
        for code in scan(text) {
            let distinct: std::collections::HashSet<char> = code.chars().collect();
            assert!(distinct.len() > 1, "degenerate code survived: {code}");
        }
    }

    #[test]
    fn extract_carries_headers_and_snippet() {
        let result = extract(&message_with_text("Your code: 482913"));
        assert!(result.codes.contains(&"482913".to_string()));
        assert_eq!(result.subject, "Verify");
        assert_eq!(result.sender, "no-reply@example.com");
        assert_eq!(result.snippet, "preview");
    }

    #[test]
    fn extract_without_payload_is_empty() {
        let message = GmailMessage { id: "m0".into(), ..Default::default() };
        assert_eq!(extract(&message), Extraction::default());
    }

    #[test]
    fn extract_twice_yields_same_codes() {
        let message = message_with_text("OTP: K3J9 and pin: 8312");
        assert_eq!(extract(&message).codes, extract(&message).codes);
    }
}
