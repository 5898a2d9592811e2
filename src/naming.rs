//! Filename helpers used while building destinations.
//!
//! This module knows about three things:
//! - bracketed author tags at the start of a name (`[tag] name`)
//! - characters that common filesystems refuse in a filename
//! - names that are technically writable but unsafe to hand to a filesystem
//!
//! # Examples
//!
//! ```
//! use sorting_hat::naming::{compose, extract_name, extract_tag};
//!
//! assert_eq!(extract_tag("[one tag, two tag] clip"), Some("one_tag,two_tag".to_string()));
//! assert_eq!(extract_name("[one tag, two tag] clip").unwrap(), "clip");
//! assert_eq!(compose(Some("a,b"), "clip"), "[a,b] clip");
//! ```

use crate::job::ValidationError;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// A leading `[...]`, `(...)` or `{...}` group followed by the rest of the name.
static TAG_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:\[([^\]]*)\]|\(([^)]*)\)|\{([^}]*)\})(.*)$")
        .expect("tag prefix pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Characters rejected by at least one mainstream filesystem.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows reserves regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Longest filename, in bytes, accepted by ext4, NTFS and APFS alike.
pub const MAX_NAME_BYTES: usize = 255;

/// Reasons a sanitized name is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsafeName {
    #[error("name is empty")]
    Empty,
    #[error("'{0}' refers to the current or parent directory")]
    DotName(String),
    #[error("'{0}' is a reserved device name")]
    Reserved(String),
    #[error("name is {0} bytes long, the limit is 255")]
    TooLong(usize),
}

/// Splits a stem into the raw interior of its bracket prefix and the remainder.
///
/// Returns `(None, stem)` when the stem has no bracket prefix.
pub fn split_prefix(stem: &str) -> (Option<&str>, &str) {
    match TAG_PREFIX.captures(stem) {
        Some(caps) => {
            let interior = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str());
            let rest = caps.get(4).map_or("", |m| m.as_str());
            (interior, rest)
        }
        None => (None, stem),
    }
}

/// Normalizes a raw tag: each comma-separated piece is trimmed and its inner
/// whitespace collapsed to `_`; empty pieces are dropped.
///
/// Returns `None` if nothing is left.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let pieces: Vec<String> = raw
        .split(',')
        .map(|piece| WHITESPACE.replace_all(piece.trim(), "_").into_owned())
        .filter(|piece| !piece.is_empty())
        .collect();

    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join(","))
    }
}

/// Extracts the normalized tag from a stem's bracket prefix, if any.
pub fn extract_tag(stem: &str) -> Option<String> {
    split_prefix(stem).0.and_then(normalize_tag)
}

/// Extracts the base name that follows an optional bracket prefix.
///
/// # Errors
///
/// Returns [`ValidationError::NoBaseName`] when nothing but the prefix (or
/// whitespace) is present.
pub fn extract_name(stem: &str) -> Result<String, ValidationError> {
    let name = split_prefix(stem).1.trim();
    if name.is_empty() {
        return Err(ValidationError::NoBaseName {
            name: stem.to_string(),
        });
    }
    Ok(name.to_string())
}

/// Joins an optional tag and a name as `"[tag] name"`.
pub fn compose(tag: Option<&str>, name: &str) -> String {
    match tag {
        Some(tag) if !tag.is_empty() => format!("[{}] {}", tag, name),
        _ => name.to_string(),
    }
}

/// Replaces characters that filesystems reject with `_`, collapses runs of
/// whitespace, and trims leading/trailing spaces and trailing dots.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || ILLEGAL_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    WHITESPACE
        .replace_all(&replaced, " ")
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}

/// Checks that `name` (plus the extension it will carry) is usable.
///
/// `extension` includes its leading dot, e.g. `".mp4"`.
pub fn check_safe(name: &str, extension: &str) -> Result<(), UnsafeName> {
    if name.is_empty() {
        return Err(UnsafeName::Empty);
    }
    if name == "." || name == ".." {
        return Err(UnsafeName::DotName(name.to_string()));
    }

    let device = name.split('.').next().unwrap_or(name).trim_end();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(device))
    {
        return Err(UnsafeName::Reserved(name.to_string()));
    }

    let total = name.len() + extension.len();
    if total > MAX_NAME_BYTES {
        return Err(UnsafeName::TooLong(total));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tag_normalizes_pieces() {
        assert_eq!(
            extract_tag("[one tag, two tag] name"),
            Some("one_tag,two_tag".to_string())
        );
        assert_eq!(extract_tag("[a, b] name"), Some("a,b".to_string()));
        assert_eq!(extract_tag("(solo) name"), Some("solo".to_string()));
        assert_eq!(extract_tag("{x ,  y} name"), Some("x,y".to_string()));
    }

    #[test]
    fn test_extract_tag_without_prefix() {
        assert_eq!(extract_tag("plain name"), None);
        assert_eq!(extract_tag("name [late]"), None);
        assert_eq!(extract_tag("[] name"), None);
    }

    #[test]
    fn test_extract_name() {
        assert_eq!(extract_name("[a, b] name").unwrap(), "name");
        assert_eq!(extract_name("[a]name").unwrap(), "name");
        assert_eq!(extract_name("  just a name ").unwrap(), "just a name");
    }

    #[test]
    fn test_extract_name_bracket_only_is_error() {
        assert!(matches!(
            extract_name("[a, b]"),
            Err(ValidationError::NoBaseName { .. })
        ));
        assert!(extract_name("[a]   ").is_err());
        assert!(extract_name("").is_err());
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose(Some("a,b"), "name"), "[a,b] name");
        assert_eq!(compose(None, "name"), "name");
        assert_eq!(compose(Some(""), "name"), "name");
    }

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize("what? a: b/c"), "what_ a_ b_c");
        assert_eq!(sanitize("tab\there"), "tab_here");
        assert_eq!(sanitize("  spaced    out  "), "spaced out");
        assert_eq!(sanitize("trailing..."), "trailing");
        assert_eq!(sanitize("[a,b] fine name"), "[a,b] fine name");
    }

    #[test]
    fn test_check_safe() {
        assert_eq!(check_safe("", ".mp4"), Err(UnsafeName::Empty));
        assert!(matches!(check_safe("..", ""), Err(UnsafeName::DotName(_))));
        assert!(matches!(check_safe("con", ".txt"), Err(UnsafeName::Reserved(_))));
        assert!(matches!(check_safe("LPT1.tar", ""), Err(UnsafeName::Reserved(_))));
        assert!(check_safe("console", ".txt").is_ok());
        assert!(matches!(
            check_safe(&"x".repeat(252), ".mp4"),
            Err(UnsafeName::TooLong(256))
        ));
        assert!(check_safe("[a,b] name", ".mp4").is_ok());
    }
}
