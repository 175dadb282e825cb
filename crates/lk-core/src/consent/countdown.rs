//! Time-to-live arithmetic for pending requests.

/// Milliseconds left until `expires_at_ms`, clamped at zero.
pub fn remaining_ms(expires_at_ms: i64, now_ms: i64) -> u64 {
    let remaining = expires_at_ms.saturating_sub(now_ms);
    u64::try_from(remaining).unwrap_or(0)
}

/// Renders a countdown as `M:SS`.
///
/// Minutes are not wrapped at 60 and not padded; seconds are always two digits.
pub fn format_countdown(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{minutes}:{seconds:02}")
}
