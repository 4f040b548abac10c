//! The deferred event model: a tagged union the parser produces and the
//! handler drains after a parse pass completes.

/// One parsed NetBeans event, carrying the fields the core handles.
/// Unknown event names never reach this type — they are logged and
/// dropped by the parser before construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `fileOpened` — editor opened or reports state for `filename`.
    FileOpened {
        /// Buffer the event was addressed to.
        buf_id: u64,
        /// Path reported by the editor.
        filename: String,
        /// Whether the file is currently open.
        opened: bool,
        /// Whether the file has unsaved modifications.
        modified: bool,
    },
    /// `insert` — text inserted at `offset` into `buf_id`.
    Insert {
        /// Buffer the insert happened in.
        buf_id: u64,
        /// Character offset of the insert.
        offset: u64,
        /// Unescaped inserted text.
        text: String,
    },
    /// `version` — editor protocol version string.
    Version {
        /// Buffer the event was addressed to.
        buf_id: u64,
        /// Version text reported.
        text: String,
    },
    /// `startupDone` — the editor finished its own startup handshake.
    StartupDone {
        /// Buffer the event was addressed to (conventionally 0).
        buf_id: u64,
    },
    /// `killed` — the editor closed `buf_id`; its id is never reused.
    Killed {
        /// Buffer that was closed.
        buf_id: u64,
    },
    /// `disconnect` — the editor is tearing down the connection.
    Disconnect,
}

impl Event {
    /// The buffer id the event was addressed to, if any (`Disconnect` has
    /// none, since it is not buffer-scoped).
    #[must_use]
    pub fn buf_id(&self) -> Option<u64> {
        match self {
            Event::FileOpened { buf_id, .. }
            | Event::Insert { buf_id, .. }
            | Event::Version { buf_id, .. }
            | Event::StartupDone { buf_id }
            | Event::Killed { buf_id } => Some(*buf_id),
            Event::Disconnect => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buf_id_present_for_scoped_events() {
        let ev = Event::Insert { buf_id: 3, offset: 1, text: "x".into() };
        assert_eq!(ev.buf_id(), Some(3));
    }

    #[test]
    fn disconnect_has_no_buf_id() {
        assert_eq!(Event::Disconnect.buf_id(), None);
    }
}
