//! Utility functions for notification channels

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Maximum length of a response body kept for logging
pub const MAX_BODY_LENGTH: usize = 500;

/// Truncate a string to at most `max_len` bytes without splitting a
/// multi-byte character.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Truncate to at most `max_chars` characters, counting chars not bytes.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 5), "hello... [truncated]");
        // 'é' is two bytes; never split it
        assert_eq!(truncate_string("éé", 3), "é... [truncated]");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"GET /<script>?a=1&b="2""#),
            "GET /&lt;script&gt;?a=1&amp;b=&quot;2&quot;"
        );
        assert_eq!(escape_html("plain 8.0%"), "plain 8.0%");
    }
}
