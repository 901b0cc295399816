//! The matcher table — one row per recognizable code shape.
//!
//! Adding a locale or label means adding a row here; the extractor's
//! control flow never changes.

use std::sync::LazyLock;

use regex::Regex;

/// Shape of the token a matcher captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// 4–8 consecutive digits.
    Digits,
    /// 4–8 alphanumeric characters.
    Alphanumeric,
}

/// One pattern matcher: an optional label keyword followed by a token.
///
/// A `None` label is the bare-digit-run matcher that catches codes sent
/// with no label at all.
#[derive(Debug, Clone, Copy)]
pub struct MatcherSpec {
    pub label: Option<&'static str>,
    pub shape: TokenShape,
}

/// Ordered matcher table. Every matcher runs against the full text
/// independently; labeled matchers are case-insensitive.
pub const MATCHERS: &[MatcherSpec] = &[
    MatcherSpec { label: None, shape: TokenShape::Digits },
    MatcherSpec { label: Some("code"), shape: TokenShape::Alphanumeric },
    MatcherSpec { label: Some("verification"), shape: TokenShape::Alphanumeric },
    MatcherSpec { label: Some("confirm"), shape: TokenShape::Alphanumeric },
    MatcherSpec { label: Some("подтверждения"), shape: TokenShape::Digits },
    MatcherSpec { label: Some("код"), shape: TokenShape::Digits },
    MatcherSpec { label: Some("OTP"), shape: TokenShape::Alphanumeric },
    MatcherSpec { label: Some("pin"), shape: TokenShape::Digits },
    MatcherSpec { label: Some("token"), shape: TokenShape::Alphanumeric },
];

impl MatcherSpec {
    fn pattern(&self) -> String {
        let token = match self.shape {
            TokenShape::Digits => r"\d{4,8}",
            TokenShape::Alphanumeric => "[A-Z0-9]{4,8}",
        };
        match self.label {
            None => format!(r"\b({token})\b"),
            // (?i) also lets [A-Z0-9] match lowercase letters.
            Some(label) => format!(r"(?i){label}[:\s]+({token})"),
        }
    }
}

/// Compiled matcher regexes, in table order.
pub static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MATCHERS
        .iter()
        .map(|m| Regex::new(&m.pattern()).expect("matcher table patterns are valid"))
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(PATTERNS.len(), MATCHERS.len());
    }

    #[test]
    fn bare_digit_matcher_respects_boundaries() {
        let bare = &PATTERNS[0];
        assert_eq!(bare.captures("ref 482913.").unwrap()[1].to_string(), "482913");
        // Runs longer than 8 digits are not codes.
        assert!(bare.captures("order 123456789 shipped").is_none());
        // Runs shorter than 4 digits are not codes.
        assert!(bare.captures("room 42").is_none());
    }

    #[test]
    fn labeled_matchers_are_case_insensitive() {
        let text = "CODE: ab12cd";
        let hit = PATTERNS
            .iter()
            .zip(MATCHERS)
            .filter(|(_, m)| m.label == Some("code"))
            .any(|(re, _)| re.is_match(text));
        assert!(hit);
    }

    #[test]
    fn digit_labels_reject_letter_tokens() {
        let pin = PATTERNS
            .iter()
            .zip(MATCHERS)
            .find(|(_, m)| m.label == Some("pin"))
            .map(|(re, _)| re)
            .unwrap();
        assert!(pin.is_match("pin: 4821"));
        assert!(!pin.is_match("pin: ABCD"));
    }

    #[test]
    fn localized_label_matches() {
        let text = "Ваш код подтверждения: 773210";
        let hit = PATTERNS
            .iter()
            .zip(MATCHERS)
            .filter(|(_, m)| m.label == Some("подтверждения"))
            .any(|(re, _)| re.is_match(text));
        assert!(hit);
    }
}
