//! Structured-extraction recovery.
//!
//! Turns raw model completions into records: locate the JSON object in the
//! text, parse it (falling back to an empty record), then attach the source
//! identifier. Records stay schema-agnostic here.

mod linker;
mod locator;
mod parser;

pub use linker::link_ids;
pub use locator::locate_json_object;
pub use parser::{Recovered, RecoveryParser};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, crate::error::ExtractionError>;

/// First `max_chars` characters of `text`, marked when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
        // Multi-byte characters are never split.
        assert_eq!(preview("zażółć", 3), "zaż...");
    }
}
