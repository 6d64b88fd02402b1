//! Filename helpers for predicted download names.
//!
//! Media titles routinely contain characters that are invalid on Windows or
//! act as path separators elsewhere. The predicted name is used both for the
//! existence check and as a literal output template, so both sides see the
//! same sanitized string.

/// Characters that are invalid in Windows filenames
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize a string for use as a filename on all platforms.
///
/// Control characters and Windows-invalid characters become `_` (runs are
/// collapsed), leading/trailing spaces and dots are trimmed and reserved
/// device names get a `_` prefix. Non-ASCII text is kept as is.
///
/// ```
/// use ytdl_web::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC [720p].mp4"), "AC_DC [720p].mp4");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || WINDOWS_INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    if WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| upper == *reserved || upper.starts_with(&format!("{reserved}.")))
    {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Escape a literal filename for use as an engine output template.
///
/// The engine treats `%` as the start of a field reference.
pub fn escape_output_template(name: &str) -> String {
    name.replace('%', "%%")
}

/// First `max` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
