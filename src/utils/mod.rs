//! Shared helpers
//!
//! Logging setup, timing, and text utilities.

pub mod logger;
pub mod timer;

/// Truncate to at most `max` characters, marking the cut with "..."
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
