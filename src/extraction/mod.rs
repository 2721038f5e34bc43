//! Token extraction from message text
//!
//! Channels that post encrypted archives usually put the archive password in
//! the message body ("Password: @channel", "pass (s3cr3t)", ...). This module
//! pulls that token out so it can be stored next to the file (see
//! [`output_file_name`](crate::naming::output_file_name)).
//!
//! Extraction is pure: unmatched text simply yields an empty [`ExtractedToken`].

mod patterns;

use serde::{Deserialize, Serialize};

use patterns::TOKEN_PATTERNS;

/// Prefixes removed from a captured token
const STRIPPED_URL_PREFIXES: &[&str] = &["https://t.me/", "http://t.me/"];

/// Token found in a message, in raw and filename-safe form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedToken {
    /// The token as written (minus a leading `@` or link prefix)
    pub raw: Option<String>,
    /// The token with everything but alphanumerics, `.`, `-` and `_` replaced by `_`
    pub sanitized: Option<String>,
}

impl ExtractedToken {
    /// Whether a token was found
    pub fn is_some(&self) -> bool {
        self.raw.is_some()
    }
}

/// Extract the token from a message body
///
/// Patterns are tried in order and the first one that matches wins; labeled
/// and structured forms come before the bare `pass: <token>` form.
///
/// # Examples
///
/// ```
/// use channel_dl::extraction::extract_token;
///
/// let token = extract_token("Password: @abc123");
/// assert_eq!(token.raw.as_deref(), Some("abc123"));
/// assert_eq!(token.sanitized.as_deref(), Some("abc123"));
///
/// assert!(!extract_token("just a file, enjoy").is_some());
/// ```
#[must_use]
pub fn extract_token(text: &str) -> ExtractedToken {
    if text.trim().is_empty() {
        return ExtractedToken::default();
    }

    for pattern in TOKEN_PATTERNS.iter() {
        let Some(captured) = pattern.captures(text).and_then(|caps| caps.get(1)) else {
            continue;
        };
        let raw = strip_markers(captured.as_str().trim());
        if raw.is_empty() {
            continue;
        }
        tracing::debug!(pattern = %pattern.as_str(), "Token found in message text");
        return ExtractedToken {
            sanitized: Some(sanitize_token(raw)),
            raw: Some(raw.to_string()),
        };
    }

    ExtractedToken::default()
}

/// Remove a leading `@` or a known link prefix
fn strip_markers(token: &str) -> &str {
    if let Some(handle) = token.strip_prefix('@') {
        return handle;
    }
    for prefix in STRIPPED_URL_PREFIXES {
        if token.len() >= prefix.len()
            && token.is_char_boundary(prefix.len())
            && token[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return &token[prefix.len()..];
        }
    }
    token
}

/// Replace every character outside `[alphanumeric . - _]` with `_`
#[must_use]
pub fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
