//! Ordered token patterns.
//!
//! Order matters: a message like `Password for archive: (abc)` must be caught
//! by the parenthesized form before the bare `pass: <token>` form grabs `(abc)`.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

const PATTERN_SOURCES: &[&str] = &[
    // "Password: @handle", "pass:@handle"
    r"(?i)pass(?:word)?\s*:\s*(@\w+)",
    // "password @handle"
    r"(?i)pass(?:word)?\s+(@\w+)",
    // "password for archive: @handle"
    r"(?i)pass(?:word)?\s+for\s+archive\s*:\s*(@\w+)",
    // "pass: https://t.me/handle"
    r"(?i)pass\s*:\s*(https?://t\.me/\w+)",
    // "password for archive (value)"
    r"(?i)pass(?:word)?\s+for\s+archive\s*:?\s*\(([^)]+)\)",
    // "password: (value)", "pass (value)"
    r"(?i)pass(?:word)?\s*[:\s]*\(([^)]+)\)",
    // "password: value"
    r"(?i)pass(?:word)?\s*:\s*(\S+)",
    // "password for archive value"
    r"(?i)pass(?:word)?\s+for\s+archive\s+(\S+)",
    // "🔐 value"
    r"🔐\s*(\S+)",
    // "key: value"
    r"(?i)key\s*:\s*(\S+)",
];

/// Compiled token patterns in priority order
pub(super) static TOKEN_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_patterns(PATTERN_SOURCES));

/// Compile patterns, logging and skipping any that fail to build.
fn compile_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .filter_map(|source| {
            regex::RegexBuilder::new(source)
                .size_limit(1024 * 1024)
                .build()
                .map_err(|e| {
                    warn!(pattern = %source, error = %e, "Invalid token pattern");
                })
                .ok()
        })
        .collect()
}
