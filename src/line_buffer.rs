//! Per-descriptor line reassembly.

/// Accumulates bytes from one descriptor and emits complete, trimmed,
/// non-empty lines. One instance exists per PTY and one for the editor
/// socket; there is no maximum length in this implementation (see the
/// design notes on why that cap was not added).
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        LineBuffer { buf: Vec::new() }
    }

    /// Append `bytes`, then repeatedly split on the first LF, trimming
    /// leading/trailing whitespace (including a trailing CR) from each
    /// segment and invoking `on_line` for each non-empty result. Partial
    /// trailing content remains buffered for the next call.
    pub fn add(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) {
        self.buf.extend_from_slice(bytes);

        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                on_line(trimmed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_no_lines_for_partial_data() {
        let mut buf = LineBuffer::new();
        let mut seen = Vec::new();
        buf.add(b"hello", |l| seen.push(l.to_string()));
        assert!(seen.is_empty());
    }

    #[test]
    fn emits_complete_line_and_keeps_remainder() {
        let mut buf = LineBuffer::new();
        let mut seen = Vec::new();
        buf.add(b"1:insert=42 hello\npartial", |l| seen.push(l.to_string()));
        assert_eq!(seen, vec!["1:insert=42 hello"]);
        buf.add(b" more\n", |l| seen.push(l.to_string()));
        assert_eq!(seen, vec!["1:insert=42 hello", "partial more"]);
    }

    #[test]
    fn strips_trailing_cr() {
        let mut buf = LineBuffer::new();
        let mut seen = Vec::new();
        buf.add(b"line one\r\n", |l| seen.push(l.to_string()));
        assert_eq!(seen, vec!["line one"]);
    }

    #[test]
    fn skips_empty_lines() {
        let mut buf = LineBuffer::new();
        let mut seen = Vec::new();
        buf.add(b"\n\n  \nreal\n", |l| seen.push(l.to_string()));
        assert_eq!(seen, vec!["real"]);
    }

    #[test]
    fn handles_multiple_lines_in_one_chunk() {
        let mut buf = LineBuffer::new();
        let mut seen = Vec::new();
        buf.add(b"a\nb\nc\n", |l| seen.push(l.to_string()));
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
