//! The embedded application-level command protocol, carried inside
//! NetBeans `insert` events on the outbox buffer and inside `sendToVim`
//! frames on the inbox buffer.

use std::sync::LazyLock;

use regex::Regex;

static EXEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##_EXEC_(\d+)_\[(.*)\]_##$").expect("valid regex"));
static KILL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##_KILL_(\d+)_##$").expect("valid regex"));
static DATA_AND_PAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##_DATA_(\d+)_AND_PAUSE_AFTER_(\d+)_##(.*)$").expect("valid regex")
});
static DATA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##_DATA_(\d+)_##(.*)$").expect("valid regex"));
static PAUSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##_PAUSE_##$").expect("valid regex"));
static CONTINUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##_CONTINUE_##$").expect("valid regex"));

/// A command read back from an outbox `insert` event.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Spawn `cmd` under `/bin/sh -c` in a new PTY registered as `id`.
    Exec { id: u64, cmd: String },
    /// Terminate the process registered as `id`.
    Kill { id: u64 },
    /// Forward `payload` to process `id`'s stdin.
    Data { id: u64, payload: String },
    /// Forward `payload` to process `id`'s stdin, then arm the auto-pause
    /// counter for `n` subsequent messages originating from `id`.
    DataAndPause { id: u64, pause_after: u64, payload: String },
    /// Stop delivering messages to the editor until `Continue`.
    Pause,
    /// Resume delivery, flushing any queued messages in FIFO order.
    Continue,
}

/// Parse one outbox-insert line as an embedded protocol command.
///
/// Tries `DataAndPause` before the plain `Data` pattern since they share a
/// prefix. Returns `None` for a line matching none of the patterns; the
/// caller logs this as a protocol error and discards the line.
#[must_use]
pub fn parse(line: &str) -> Option<AppCommand> {
    if let Some(caps) = DATA_AND_PAUSE_RE.captures(line) {
        return Some(AppCommand::DataAndPause {
            id: caps[1].parse().ok()?,
            pause_after: caps[2].parse().ok()?,
            payload: caps[3].to_string(),
        });
    }
    if let Some(caps) = DATA_RE.captures(line) {
        return Some(AppCommand::Data { id: caps[1].parse().ok()?, payload: caps[2].to_string() });
    }
    if let Some(caps) = EXEC_RE.captures(line) {
        return Some(AppCommand::Exec { id: caps[1].parse().ok()?, cmd: caps[2].to_string() });
    }
    if let Some(caps) = KILL_RE.captures(line) {
        return Some(AppCommand::Kill { id: caps[1].parse().ok()? });
    }
    if PAUSE_RE.is_match(line) {
        return Some(AppCommand::Pause);
    }
    if CONTINUE_RE.is_match(line) {
        return Some(AppCommand::Continue);
    }
    None
}

/// Format the `##_STARTED_<id>_##` frame sent to the inbox after a
/// successful `EXEC`.
#[must_use]
pub fn format_started(id: u64) -> String {
    format!("##_STARTED_{id}_##")
}

/// Format the `##_TERMINATED_<id>_##` frame sent to the inbox when a
/// process exits (on its own, or via `KILL`).
#[must_use]
pub fn format_terminated(id: u64) -> String {
    format!("##_TERMINATED_{id}_##")
}

/// Format the `##_DATA_<id>_##<line>` frame sent to the inbox for each
/// complete line of process output.
#[must_use]
pub fn format_data(id: u64, line: &str) -> String {
    format!("##_DATA_{id}_##{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exec() {
        assert_eq!(
            parse("##_EXEC_5_[echo hello]_##"),
            Some(AppCommand::Exec { id: 5, cmd: "echo hello".into() })
        );
    }

    #[test]
    fn parses_exec_with_brackets_in_command() {
        assert_eq!(
            parse("##_EXEC_5_[echo [a]]_##"),
            Some(AppCommand::Exec { id: 5, cmd: "echo [a]".into() })
        );
    }

    #[test]
    fn parses_kill() {
        assert_eq!(parse("##_KILL_9_##"), Some(AppCommand::Kill { id: 9 }));
    }

    #[test]
    fn parses_data() {
        assert_eq!(
            parse("##_DATA_5_##hello world"),
            Some(AppCommand::Data { id: 5, payload: "hello world".into() })
        );
    }

    #[test]
    fn parses_data_and_pause_before_plain_data() {
        assert_eq!(
            parse("##_DATA_9_AND_PAUSE_AFTER_2_##ping"),
            Some(AppCommand::DataAndPause { id: 9, pause_after: 2, payload: "ping".into() })
        );
    }

    #[test]
    fn parses_pause_and_continue() {
        assert_eq!(parse("##_PAUSE_##"), Some(AppCommand::Pause));
        assert_eq!(parse("##_CONTINUE_##"), Some(AppCommand::Continue));
    }

    #[test]
    fn unmatched_line_returns_none() {
        assert_eq!(parse("not a protocol command"), None);
    }

    #[test]
    fn formats_outbound_frames() {
        assert_eq!(format_started(5), "##_STARTED_5_##");
        assert_eq!(format_terminated(5), "##_TERMINATED_5_##");
        assert_eq!(format_data(5, "hello"), "##_DATA_5_##hello");
    }
}
