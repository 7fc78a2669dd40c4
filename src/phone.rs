//! Phone number canonicalization for deep-link construction

use crate::error::{DeviceError, Result};

/// Canonicalize a raw phone number
///
/// A leading `+` is kept and every other non-digit character is stripped.
/// Without a leading `+`, all non-digits are stripped (including any `+`
/// that appears later in the string). The `+` must be the very first
/// character; leading whitespace makes the number national.
pub fn normalize(raw: &str) -> Result<String> {
    let international = raw.starts_with('+');

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(DeviceError::InvalidParameters(format!(
            "phone number '{}' contains no digits",
            raw
        )));
    }

    if international {
        Ok(format!("+{}", digits))
    } else {
        Ok(digits)
    }
}

/// Strip the leading `+` from a normalized number
///
/// Used for APIs that want bare digit strings (e.g., web fallback links).
pub fn digits_only(normalized: &str) -> &str {
    normalized.strip_prefix('+').unwrap_or(normalized)
}
