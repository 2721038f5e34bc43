//! Tests for token extraction.

use super::*;

fn raw(text: &str) -> Option<String> {
    extract_token(text).raw
}

// -----------------------------------------------------------------------
// Handle forms
// -----------------------------------------------------------------------

#[test]
fn labeled_handle_strips_at_marker() {
    let token = extract_token("Password: @abc123");
    assert_eq!(token.raw.as_deref(), Some("abc123"));
    assert_eq!(token.sanitized.as_deref(), Some("abc123"));
}

#[test]
fn handle_without_colon_is_recognized() {
    assert_eq!(raw("🔶🔶 PASSWORD @LeakHub").as_deref(), Some("LeakHub"));
}

#[test]
fn handle_label_is_case_insensitive() {
    assert_eq!(raw("pAsS:@mixed_Case").as_deref(), Some("mixed_Case"));
}

#[test]
fn handle_after_localized_prefix_is_found() {
    assert_eq!(raw("🗃 Пароль / Pass: @cloudlogs").as_deref(), Some("cloudlogs"));
}

// -----------------------------------------------------------------------
// Link form
// -----------------------------------------------------------------------

#[test]
fn link_prefix_is_stripped() {
    assert_eq!(raw("📁 pass: https://t.me/archive_chan").as_deref(), Some("archive_chan"));
}

#[test]
fn link_prefix_is_stripped_case_insensitively() {
    assert_eq!(raw("PASS: HTTPS://T.ME/Upper").as_deref(), Some("Upper"));
}

// -----------------------------------------------------------------------
// Parenthesized forms
// -----------------------------------------------------------------------

#[test]
fn parenthesized_value_is_captured() {
    let token = extract_token("Password: (s3cr3t)");
    assert_eq!(token.raw.as_deref(), Some("s3cr3t"));
    assert_eq!(token.sanitized.as_deref(), Some("s3cr3t"));
}

#[test]
fn parenthesized_value_for_archive_keeps_inner_spaces_in_raw_form() {
    let token = extract_token("Password for archive: (open sesame)");
    assert_eq!(token.raw.as_deref(), Some("open sesame"));
    assert_eq!(token.sanitized.as_deref(), Some("open_sesame"));
}

#[test]
fn parenthesized_value_may_follow_a_newline() {
    assert_eq!(raw("pass:\n(line2)").as_deref(), Some("line2"));
}

// -----------------------------------------------------------------------
// Bare forms
// -----------------------------------------------------------------------

#[test]
fn bare_token_after_colon() {
    assert_eq!(raw("Archive password: Xy9!z more text").as_deref(), Some("Xy9!z"));
}

#[test]
fn bare_token_for_archive_without_colon() {
    assert_eq!(raw("password for archive qwerty").as_deref(), Some("qwerty"));
}

#[test]
fn lock_emoji_label() {
    assert_eq!(raw("🔐 hunter2").as_deref(), Some("hunter2"));
}

#[test]
fn key_label() {
    let token = extract_token("KEY: xyz!");
    assert_eq!(token.raw.as_deref(), Some("xyz!"));
    assert_eq!(token.sanitized.as_deref(), Some("xyz_"));
}

// -----------------------------------------------------------------------
// Ordering and misses
// -----------------------------------------------------------------------

#[test]
fn first_matching_pattern_wins() {
    assert_eq!(raw("pass @first\nkey: second").as_deref(), Some("first"));
}

#[test]
fn parenthesized_form_beats_bare_form() {
    // The bare form would have captured "(wrapped)" including the parentheses.
    assert_eq!(raw("password: (wrapped)").as_deref(), Some("wrapped"));
}

#[test]
fn text_without_label_yields_nothing() {
    let token = extract_token("Fresh logs inside, enjoy");
    assert_eq!(token, ExtractedToken::default());
    assert!(token.raw.is_none());
    assert!(token.sanitized.is_none());
}

#[test]
fn empty_text_yields_nothing() {
    assert!(!extract_token("").is_some());
    assert!(!extract_token("   \n").is_some());
}

#[test]
fn marker_only_token_is_not_a_token() {
    assert!(!extract_token("password: @").is_some());
}

// -----------------------------------------------------------------------
// Sanitization
// -----------------------------------------------------------------------

#[test]
fn sanitize_token_keeps_word_chars_dots_and_hyphens() {
    assert_eq!(sanitize_token("a.b-c_d"), "a.b-c_d");
    assert_eq!(sanitize_token("a/b\\c d"), "a_b_c_d");
    assert_eq!(sanitize_token("пароль1"), "пароль1");
}

#[test]
fn sanitized_token_differs_only_where_required() {
    let token = extract_token("pass: p@ss/w0rd");
    assert_eq!(token.raw.as_deref(), Some("p@ss/w0rd"));
    assert_eq!(token.sanitized.as_deref(), Some("p_ss_w0rd"));
}
