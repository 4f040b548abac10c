//! Typed error taxonomy for the bridge.
//!
//! Recoverable, per-call-site conditions use [`BridgeError`] so callers can
//! match on kind and apply the recovery policy described for each variant.
//! Top-level orchestration (`main`, [`crate::session::Session::run`]) wraps
//! these in `anyhow::Result` the way the rest of this codebase's entry
//! points do.

use std::io;

/// Errors surfaced by the protocol engine, process manager, and I/O layers.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A line did not match the event or reply grammar, or matched but its
    /// argument string did not parse. Policy: log at error, drop the line.
    #[error("malformed NetBeans line: {0}")]
    ProtocolParseError(String),

    /// An event name outside the handled set. Policy: log at debug, continue.
    #[error("unknown NetBeans event: {0}")]
    UnknownEvent(String),

    /// A reply referenced a `SeqId` with no registered callback. Policy:
    /// silently drop; this is not treated as an error condition by callers.
    #[error("reply for unregistered seq {0}")]
    UnknownSeq(u64),

    /// PTY allocation or child spawn failed. Policy: log; no `##_STARTED_##`
    /// frame is emitted, so the editor observes a timeout.
    #[error("failed to spawn process: {0}")]
    ProcessSpawnError(String),

    /// I/O failure on a PTY master or the editor socket.
    #[error("I/O error ({kind}): {source}")]
    Io {
        /// Which descriptor class failed.
        kind: IoKind,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// CLI arguments failed validation. Policy: print and exit 1 before the
    /// event loop starts.
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

/// Distinguishes which descriptor class an [`BridgeError::Io`] came from,
/// since the recovery policy differs: PTY failures isolate to the owning
/// process, socket failures are session-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    /// Read/write failure on a PTY master.
    Pty,
    /// Read/write failure on the editor's TCP socket.
    Socket,
}

impl std::fmt::Display for IoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoKind::Pty => write!(f, "pty"),
            IoKind::Socket => write!(f, "socket"),
        }
    }
}

impl BridgeError {
    /// Wrap an I/O error originating from a PTY master.
    #[must_use]
    pub fn pty_io(source: io::Error) -> Self {
        BridgeError::Io { kind: IoKind::Pty, source }
    }

    /// Wrap an I/O error originating from the editor socket.
    #[must_use]
    pub fn socket_io(source: io::Error) -> Self {
        BridgeError::Io { kind: IoKind::Socket, source }
    }

    /// True for errors whose recovery policy is "isolate and continue"
    /// rather than "terminate the session".
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::ProtocolParseError(_)
            | BridgeError::UnknownEvent(_)
            | BridgeError::UnknownSeq(_)
            | BridgeError::ProcessSpawnError(_) => true,
            BridgeError::Io { kind, .. } => *kind == IoKind::Pty,
            BridgeError::ConfigError(_) => false,
        }
    }
}
