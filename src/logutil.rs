//! Logging helpers that keep chat-derived strings on a single line and keep the
//! IRC password out of log files.

use std::fmt::Write;

/// Chat characters shown in one log record before the rest is summarized.
pub const LOG_PREVIEW_CHARS: usize = 120;

/// Render untrusted chat text as a single log-safe line. Backslashes and control
/// characters are written in their escaped form (`\n`, `\u{7}`), and text past
/// [`LOG_PREVIEW_CHARS`] collapses into a count of what was left out.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(LOG_PREVIEW_CHARS) + 16);
    let mut chars = s.chars();
    for ch in chars.by_ref().take(LOG_PREVIEW_CHARS) {
        if ch == '\\' || ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    let omitted = chars.count();
    if omitted > 0 {
        let _ = write!(out, "… (+{} chars)", omitted);
    }
    out
}

/// Render an outbound protocol line for logs, masking the argument of `PASS`.
pub fn redact_outbound(line: &str) -> String {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    match trimmed.split_once(' ') {
        Some((cmd, _)) if cmd.eq_ignore_ascii_case("PASS") => format!("{} ********", cmd),
        _ => escape_log(trimmed),
    }
}
