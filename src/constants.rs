//! Session-wide constants.
//!
//! Grouped by the subsystem they govern, each with a short rationale the
//! way the values they replace were chosen in the original implementation.

use std::time::Duration;

/// Readiness-wait timeout for the Proxy's dispatch loop. Bounds how long
/// `stop()` takes to be observed; small enough that the loop feels
/// responsive, large enough to avoid busy-spinning on an idle session.
pub const SELECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum bytes read per ready descriptor per iteration. Matches the
/// original's chunk size; large enough to drain a typical burst of PTY
/// output in one read, small enough to keep the loop fair across fds.
pub const READ_CHUNK_SIZE: usize = 4096;

/// First `BufferId` allocated in a session.
pub const FIRST_BUFFER_ID: u64 = 1;

/// First `SeqId` allocated in a session. 42 is inherited from the original
/// implementation; there is no significance beyond "not 0 or 1", which
/// would be easy to confuse with a buffer id in logs.
pub const FIRST_SEQ_ID: u64 = 42;

/// Offset sentinel interpreted by the editor as "end of buffer", used by
/// `sendToVim` to append without a `getCursor` round-trip. Brittle but kept
/// as-is; see the design notes on why this was not replaced.
pub const END_OF_BUFFER_OFFSET: u64 = 99999;

/// Default TCP port the bridge listens on.
pub const DEFAULT_PORT: u16 = 60101;

/// Default listen interface.
pub const DEFAULT_BIND: &str = "localhost";

/// Default log file path.
pub const DEFAULT_LOG_PATH: &str = "VimProcRunner.log";

/// Default filename registered for the inbox buffer.
pub const DEFAULT_INBOX_FILENAME: &str = "vim-async-beans.in";

/// Default filename registered for the outbox buffer.
pub const DEFAULT_OUTBOX_FILENAME: &str = "vim-async-beans.out";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_timeout_is_sub_second() {
        assert!(SELECT_TIMEOUT < Duration::from_secs(1));
    }

    #[test]
    fn allocators_start_distinctly() {
        assert_ne!(FIRST_BUFFER_ID, FIRST_SEQ_ID);
        assert!(FIRST_BUFFER_ID > 0);
        assert!(FIRST_SEQ_ID > 0);
    }

    #[test]
    fn default_port_in_ephemeral_adjacent_range() {
        assert!(DEFAULT_PORT > 1024);
    }
}
