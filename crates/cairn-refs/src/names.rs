//! Reference name validation.
//!
//! Each reference is a single file directly under `refs/`, so a valid name:
//! - is non-empty and at most [`MAX_NAME_LEN`] bytes
//! - contains no `/`, whitespace, control characters, or any of
//!   `~ ^ : ? * [ \`
//! - contains no `..` and no `@{`
//! - does not start with `.` (this also keeps temporary files out of the
//!   namespace) and does not end with `.` or `.lock`

use crate::error::{RefError, RefResult};

/// Longest accepted name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &['/', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a reference name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cairn_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("main").is_ok());
/// assert!(validate_ref_name("release-1.0").is_ok());
/// assert!(validate_ref_name("").is_err());
/// assert!(validate_ref_name("feature/auth").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "ref name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(name, format!("longer than {MAX_NAME_LEN} bytes")));
    }

    if let Some(ch) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }

    Ok(())
}
