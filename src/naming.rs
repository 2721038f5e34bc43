//! File naming and on-disk layout
//!
//! Attachment names come from arbitrary users and may contain emoji, path
//! separators, reserved characters or nothing at all. Everything written to
//! disk goes through [`sanitize_filename`] first.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use crate::config::LayoutConfig;
use crate::extraction::ExtractedToken;

/// Name used when sanitizing leaves nothing behind
pub const PLACEHOLDER_NAME: &str = "unnamed";

/// Separator between the sanitized stem and the token
pub const TOKEN_SUFFIX: &str = "_token-";

/// Token written when the message text carried none
pub const NO_TOKEN: &str = "NOPASSWORD";

/// Longest sanitized stem kept in an output name, in bytes
pub const MAX_STEM_BYTES: usize = 120;

/// Longest token kept in an output name, in bytes
pub const MAX_TOKEN_BYTES: usize = 64;

/// Longest extension (dot included) kept in an output name, in bytes
pub const MAX_EXTENSION_BYTES: usize = 16;

/// Characters replaced by an underscore
const RESERVED_CHARS: &[char] = &['[', ']', '<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Normalize arbitrary text into a safe file name
///
/// The result contains only printable ASCII, none of `[ ] < > : " / \ | ? *`,
/// no leading or trailing `-`/`_`, and is never empty.
///
/// # Examples
///
/// ```
/// use channel_dl::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My Report [final].pdf"), "My-Report-final-.pdf");
/// assert_eq!(sanitize_filename("Café crème"), "Cafe-creme");
/// assert_eq!(sanitize_filename("🔥🔥"), "unnamed");
/// ```
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned = clean(raw);
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned
    }
}

/// Sanitization steps without the placeholder substitution
fn clean(raw: &str) -> String {
    let without_emoji: String = raw.chars().filter(|c| !is_pictographic(*c)).collect();

    let mut out = String::with_capacity(without_emoji.len());
    let mut in_separator_run = false;
    for c in without_emoji.nfkd() {
        let c = match c {
            ' ' => '-',
            c if RESERVED_CHARS.contains(&c) => '_',
            c => c,
        };
        if !c.is_ascii() || c.is_ascii_control() {
            continue;
        }
        if c == '-' || c == '_' {
            if !in_separator_run {
                out.push('-');
                in_separator_run = true;
            }
        } else {
            out.push(c);
            in_separator_run = false;
        }
    }

    out.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Emoji and pictographic symbols, including the joiners and selectors that
/// glue emoji sequences together
fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0x2190..=0x21FF
            | 0x25A0..=0x25FF
            | 0xFE00..=0xFE0F
            | 0xE0020..=0xE007F
            | 0x200D
            | 0x20E3
            | 0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
    )
}

/// Split a file name into stem and extension
///
/// The extension includes its dot. Leading dots belong to the stem, so
/// `.env` has no extension and `archive.tar.gz` has `.gz`.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(idx) => name.split_at(leading_dots + idx),
        None => (name, ""),
    }
}

/// Lowercased extension used for allow-list checks
#[must_use]
pub fn extension_of(name: &str) -> String {
    split_extension(name).1.to_lowercase()
}

fn sanitize_extension(ext: &str) -> String {
    let body = clean(ext.trim_start_matches('.'));
    let body = truncate_bytes(&body, MAX_EXTENSION_BYTES - 1).trim_end_matches('-');
    if body.is_empty() {
        String::new()
    } else {
        format!(".{body}")
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitized stem capped at [`MAX_STEM_BYTES`]
fn bounded_stem(stem: &str) -> String {
    let safe = sanitize_filename(stem);
    let capped = truncate_bytes(&safe, MAX_STEM_BYTES).trim_end_matches(['-', '.']);
    if capped.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        capped.to_string()
    }
}

/// Final on-disk name of an attachment
///
/// `<sanitized stem>_token-<token or NOPASSWORD><extension>`, so downloads of
/// the same attachment with and without a token never collide. The stem, the
/// token and the extension are each length-capped so the name stays well
/// under the usual 255-byte file name limit.
///
/// # Examples
///
/// ```
/// use channel_dl::extraction::extract_token;
/// use channel_dl::naming::output_file_name;
///
/// let token = extract_token("Password: (s3cr3t)");
/// assert_eq!(output_file_name("dump 2024.zip", &token), "dump-2024_token-s3cr3t.zip");
///
/// let none = extract_token("no label here");
/// assert_eq!(output_file_name("notes.txt", &none), "notes_token-NOPASSWORD.txt");
/// ```
#[must_use]
pub fn output_file_name(raw_name: &str, token: &ExtractedToken) -> String {
    build_file_name(raw_name, token, None)
}

/// Output name with a discriminator appended to the stem
///
/// Used when another attachment of the same run already claimed the plain
/// [`output_file_name`]: `<stem>-<discriminator>_token-<token><extension>`.
#[must_use]
pub fn disambiguated_file_name(
    raw_name: &str,
    token: &ExtractedToken,
    discriminator: &str,
) -> String {
    build_file_name(raw_name, token, Some(discriminator))
}

fn build_file_name(raw_name: &str, token: &ExtractedToken, discriminator: Option<&str>) -> String {
    let (stem, ext) = split_extension(raw_name);
    let token = token
        .sanitized
        .as_deref()
        .map(|t| truncate_bytes(t, MAX_TOKEN_BYTES))
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_TOKEN);
    let mut stem = bounded_stem(stem);
    if let Some(discriminator) = discriminator {
        stem.push('-');
        stem.push_str(&sanitize_filename(discriminator));
    }
    format!("{stem}{TOKEN_SUFFIX}{token}{}", sanitize_extension(ext))
}

/// Render a legacy naming template for an attachment name
///
/// Placeholders: `{stem}` and `{ext}` (as posted), `{safe_stem}` and
/// `{safe_ext}` (sanitized), `{raw_token}` and `{token}` (as written and
/// sanitized, `NOPASSWORD` when the message carried none).
///
/// Returns `None` when the rendered name could escape the target directory.
#[must_use]
pub fn render_legacy_name(template: &str, raw_name: &str, token: &ExtractedToken) -> Option<String> {
    let (stem, ext) = split_extension(raw_name);
    let rendered = template
        .replace("{safe_stem}", &sanitize_filename(stem))
        .replace("{safe_ext}", &sanitize_extension(ext))
        .replace("{raw_token}", token.raw.as_deref().unwrap_or(NO_TOKEN))
        .replace("{token}", token.sanitized.as_deref().unwrap_or(NO_TOKEN))
        .replace("{stem}", stem)
        .replace("{ext}", ext);

    let escapes = rendered.is_empty()
        || rendered == "."
        || rendered == ".."
        || rendered.contains('/')
        || rendered.contains('\\')
        || rendered.contains('\0');
    (!escapes).then_some(rendered)
}

/// Directory a channel's file is written to
///
/// `<root>[/<channel>][/<date>]`, each level controlled by [`LayoutConfig`].
#[must_use]
pub fn target_dir(
    root: &Path,
    layout: &LayoutConfig,
    channel_name: &str,
    date: DateTime<Utc>,
) -> PathBuf {
    let mut dir = root.to_path_buf();
    if layout.organize_by_channel {
        dir.push(sanitize_filename(channel_name));
    }
    if layout.organize_by_date {
        let mut formatted = String::new();
        if write!(formatted, "{}", date.format(&layout.date_format)).is_err() {
            tracing::warn!(
                format = %layout.date_format,
                "Invalid date format, falling back to %Y-%m-%d"
            );
            formatted = date.format("%Y-%m-%d").to_string();
        }
        for component in formatted
            .split(['/', '\\'])
            .filter(|c| !c.is_empty() && *c != "." && *c != "..")
        {
            dir.push(component);
        }
    }
    dir
}
