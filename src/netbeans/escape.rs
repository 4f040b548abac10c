//! String escaping for quoted event/command arguments.
//!
//! Escaping and unescaping are mirror images run in opposite orders:
//! escape replaces `\` before `"`, unescape replaces `\"` before `\\`.

/// Escape `text` for embedding inside a double-quoted protocol argument:
/// backslash first, then quote.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Reverse [`escape`]: quote-escape first, then backslash-escape.
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("\\\"", "\"").replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quote_and_backslash() {
        assert_eq!(escape(r#"he said "hi""#), r#"he said \"hi\""#);
        assert_eq!(escape(r"a\b"), r"a\\b");
    }

    #[test]
    fn unescapes_quote_and_backslash() {
        assert_eq!(unescape(r#"he said \"hi\""#), r#"he said "hi""#);
        assert_eq!(unescape(r"a\\b"), r"a\b");
    }

    #[test]
    fn round_trips_arbitrary_ascii() {
        let samples = [
            "plain",
            "",
            "quote\"inside",
            "back\\slash",
            "both \\ and \" together",
            "\\\\\\\"\\\\",
            "tab\tnewline\nrest",
        ];
        for s in samples {
            assert_eq!(unescape(&escape(s)), s, "round trip failed for {s:?}");
        }
    }
}
