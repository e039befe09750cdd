//! Length bounds and name checks applied before anything reaches the store.

/// Longest user name kept in the `users` tree.
pub const MAX_USER_NAME_CHARS: usize = 50;
/// Longest chat message text kept in the `messages` tree.
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Longest forbidden word kept in the `badwords` tree.
pub const MAX_BAD_WORD_CHARS: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user name cannot be empty")]
    EmptyUserName,

    #[error("user name contains control characters")]
    ControlCharacters,

    #[error("forbidden word cannot be empty")]
    EmptyBadWord,
}

/// Cut `s` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Trim and bound a chat login name. Names are kept case-preserving.
pub fn validate_user_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUserName);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacters);
    }
    Ok(truncate_chars(trimmed, MAX_USER_NAME_CHARS).to_string())
}

/// Drop control characters other than tabs. Bounding to [`MAX_MESSAGE_CHARS`] is left to
/// the caller so moderation can see the whole text first.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || c == '\t')
        .collect()
}

/// Normalize a forbidden word for storage: trimmed, lower-cased, bounded.
pub fn normalize_bad_word(word: &str) -> Result<String, ValidationError> {
    let trimmed = word.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyBadWord);
    }
    Ok(truncate_chars(&trimmed.to_lowercase(), MAX_BAD_WORD_CHARS).to_string())
}
