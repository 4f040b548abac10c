//! Line classification and deferred event dispatch.
//!
//! The parser itself never calls into application code. It classifies one
//! line at a time; the caller accumulates the resulting events into an
//! [`EventStack`] across a whole network read and drains them as a batch
//! once parsing of that read is complete, so handlers never observe a
//! half-parsed read.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use super::escape::unescape;
use super::event::Event;
use crate::error::BridgeError;

static EVENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):([A-Za-z]+)=(\d+)\s*(.*)$").expect("valid regex"));
static REPLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(.*)$").expect("valid regex"));
static FILE_OPENED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*"(.*)"\s+([TF])\s+([TF])\s*$"#).expect("valid regex"));
static INSERT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(\d+)\s+"(.*)"\s*$"#).expect("valid regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*"(.*)"\s*$"#).expect("valid regex"));

/// Result of classifying one line, before any event-argument parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedLine {
    /// An event line: `bufId:name=seq args`.
    Event { buf_id: u64, name: String, seq: u64, raw_args: String },
    /// A reply line: `seq args`.
    Reply { seq: u64, raw_args: String },
}

/// Stateless NetBeans line parser.
#[derive(Debug, Default)]
pub struct NetBeansParser;

impl NetBeansParser {
    /// Classify a single already-trimmed, non-empty line as an event or a
    /// reply. Returns `None` (after logging) if neither pattern matches.
    #[must_use]
    pub fn classify(line: &str) -> Option<ClassifiedLine> {
        if let Some(caps) = EVENT_RE.captures(line) {
            let buf_id = caps[1].parse().ok()?;
            let name = caps[2].to_string();
            let seq = caps[3].parse().ok()?;
            let raw_args = caps[4].to_string();
            return Some(ClassifiedLine::Event { buf_id, name, seq, raw_args });
        }
        if let Some(caps) = REPLY_RE.captures(line) {
            let seq = caps[1].parse().ok()?;
            let raw_args = caps[2].to_string();
            return Some(ClassifiedLine::Reply { seq, raw_args });
        }
        debug!("unparseable NetBeans line: {line:?}");
        None
    }

    /// Parse a classified event line's arguments into an [`Event`], or
    /// return `None` for event names outside the handled set (logged at
    /// debug, per the "unknown events tolerated and dropped" policy).
    pub fn parse_event(buf_id: u64, name: &str, raw_args: &str) -> Result<Option<Event>, BridgeError> {
        match name {
            "fileOpened" => {
                let caps = FILE_OPENED_RE
                    .captures(raw_args)
                    .ok_or_else(|| BridgeError::ProtocolParseError(format!("fileOpened args: {raw_args:?}")))?;
                Ok(Some(Event::FileOpened {
                    buf_id,
                    filename: unescape(&caps[1]),
                    opened: &caps[2] == "T",
                    modified: &caps[3] == "T",
                }))
            }
            "insert" => {
                let caps = INSERT_RE
                    .captures(raw_args)
                    .ok_or_else(|| BridgeError::ProtocolParseError(format!("insert args: {raw_args:?}")))?;
                let offset = caps[1]
                    .parse()
                    .map_err(|_| BridgeError::ProtocolParseError(format!("insert offset: {raw_args:?}")))?;
                Ok(Some(Event::Insert { buf_id, offset, text: unescape(&caps[2]) }))
            }
            "version" => {
                let caps = VERSION_RE
                    .captures(raw_args)
                    .ok_or_else(|| BridgeError::ProtocolParseError(format!("version args: {raw_args:?}")))?;
                Ok(Some(Event::Version { buf_id, text: unescape(&caps[1]) }))
            }
            "startupDone" => Ok(Some(Event::StartupDone { buf_id })),
            "killed" => Ok(Some(Event::Killed { buf_id })),
            "disconnect" => Ok(Some(Event::Disconnect)),
            _ => {
                debug!("unknown NetBeans event {name:?}, dropping");
                Ok(None)
            }
        }
    }
}

/// Deferred-execution queue: events accumulated during one parse pass, run
/// as a batch by the caller after the whole read has been classified.
#[derive(Debug, Default)]
pub struct EventStack {
    events: Vec<Event>,
}

impl EventStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        EventStack { events: Vec::new() }
    }

    /// Enqueue an event for later batch dispatch.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Drain all queued events in FIFO (insertion) order, clearing the
    /// stack for the next read.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_event_line() {
        let classified = NetBeansParser::classify(r#"1:fileOpened=7 "foo.txt" T F"#).unwrap();
        assert_eq!(
            classified,
            ClassifiedLine::Event {
                buf_id: 1,
                name: "fileOpened".into(),
                seq: 7,
                raw_args: r#""foo.txt" T F"#.into(),
            }
        );
    }

    #[test]
    fn classifies_reply_line() {
        let classified = NetBeansParser::classify("42 1 2 3 4").unwrap();
        assert_eq!(classified, ClassifiedLine::Reply { seq: 42, raw_args: "1 2 3 4".into() });
    }

    #[test]
    fn classification_is_deterministic_and_exclusive() {
        // Every reply-shaped line also looks like it could start an event
        // only when it contains a colon before the first digit run ends;
        // a bare numeric line is never ambiguous between the two patterns.
        let event = NetBeansParser::classify("1:insert=8 0 \"x\"");
        let reply = NetBeansParser::classify("42 ok");
        assert!(matches!(event, Some(ClassifiedLine::Event { .. })));
        assert!(matches!(reply, Some(ClassifiedLine::Reply { .. })));
    }

    #[test]
    fn unmatched_line_returns_none() {
        assert_eq!(NetBeansParser::classify("not a valid line at all !!"), None);
    }

    #[test]
    fn s1_file_opened_scenario() {
        let classified = NetBeansParser::classify(r#"1:fileOpened=7 "foo.txt" T F"#).unwrap();
        let ClassifiedLine::Event { buf_id, name, raw_args, .. } = classified else {
            panic!("expected event");
        };
        let event = NetBeansParser::parse_event(buf_id, &name, &raw_args).unwrap().unwrap();
        assert_eq!(
            event,
            Event::FileOpened { buf_id: 1, filename: "foo.txt".into(), opened: true, modified: false }
        );
    }

    #[test]
    fn s2_insert_unescape_scenario() {
        let classified = NetBeansParser::classify(r#"2:insert=8 42 "he said \"hi\"""#).unwrap();
        let ClassifiedLine::Event { buf_id, name, raw_args, .. } = classified else {
            panic!("expected event");
        };
        let event = NetBeansParser::parse_event(buf_id, &name, &raw_args).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Insert { buf_id: 2, offset: 42, text: "he said \"hi\"".into() }
        );
    }

    #[test]
    fn unknown_event_name_is_dropped_not_errored() {
        let result = NetBeansParser::parse_event(1, "someFutureEvent", "").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn event_stack_drains_fifo() {
        let mut stack = EventStack::new();
        stack.push(Event::Disconnect);
        stack.push(Event::Killed { buf_id: 3 });
        let drained = stack.drain();
        assert_eq!(drained, vec![Event::Disconnect, Event::Killed { buf_id: 3 }]);
        assert!(stack.drain().is_empty());
    }
}
