//! PTY spawn, raw-mode adjustment, and the process table.
//!
//! No terminal emulation happens here: bytes read from a PTY master are
//! handed to the owning [`crate::line_buffer::LineBuffer`] unchanged, and
//! bytes written to a PTY master are exactly the payload bytes the editor
//! sent (plus a trailing newline if missing). Control sequences pass
//! through untouched.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::thread;

use log::{debug, error, info, warn};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc::UnboundedSender;

use crate::constants::READ_CHUNK_SIZE;
use crate::error::BridgeError;

/// Application-assigned identifier for a spawned process, taken verbatim
/// from the embedded protocol's `<id>` field.
pub type ProcId = u64;

/// Events a PTY reader thread feeds into the async event loop.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    /// Raw bytes read from the process's PTY master.
    Output { proc_id: ProcId, bytes: Vec<u8> },
    /// The reader hit EOF or a read error; the process table entry for
    /// `proc_id` should be torn down.
    Closed { proc_id: ProcId, exit_code: Option<i32> },
}

/// One live spawned process: its PTY write half and a kill switch, kept
/// just long enough to service DATA/KILL commands and clean teardown.
pub struct ProcessEntry {
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    /// Kept alive only so the PTY master fd stays open for the process's
    /// lifetime; never read after construction.
    #[allow(dead_code, reason = "RAII handle, dropped to close the PTY master")]
    master: Box<dyn MasterPty + Send>,
}

impl std::fmt::Debug for ProcessEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEntry").finish_non_exhaustive()
    }
}

impl ProcessEntry {
    /// Write `payload` to the process's stdin, appending a newline if one
    /// is not already present.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the PTY master write fails.
    pub fn write_data(&mut self, payload: &str) -> Result<(), BridgeError> {
        let mut bytes = payload.as_bytes().to_vec();
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        self.writer.write_all(&bytes).map_err(BridgeError::pty_io)
    }

    /// Terminate the child with SIGTERM (Unix). Falls back to
    /// `portable_pty::Child::kill` (SIGKILL) when the child's raw pid is
    /// unavailable, e.g. on non-Unix targets.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if signaling the child fails.
    pub fn kill(&mut self) -> Result<(), BridgeError> {
        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            // SAFETY: pid is a live process id owned by this child; kill(2)
            // with SIGTERM does not retain any reference to it.
            let rc = unsafe { libc::kill(i32::try_from(pid).unwrap_or(i32::MAX), libc::SIGTERM) };
            if rc == 0 {
                return Ok(());
            }
            return Err(BridgeError::pty_io(std::io::Error::last_os_error()));
        }
        self.child.kill().map_err(BridgeError::pty_io)
    }
}

/// Bijective map from application-assigned `ProcId` to its live process
/// entry. A single id-keyed map is sufficient at the scale this bridge
/// operates at (a handful of concurrent processes per editor session).
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: HashMap<ProcId, ProcessEntry>,
}

impl ProcessTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        ProcessTable { entries: HashMap::new() }
    }

    /// Register a freshly spawned process.
    pub fn insert(&mut self, proc_id: ProcId, entry: ProcessEntry) {
        self.entries.insert(proc_id, entry);
    }

    /// Look up a live process by id.
    pub fn get_mut(&mut self, proc_id: ProcId) -> Option<&mut ProcessEntry> {
        self.entries.get_mut(&proc_id)
    }

    /// Remove and return a process entry, e.g. on KILL or exit.
    pub fn remove(&mut self, proc_id: ProcId) -> Option<ProcessEntry> {
        self.entries.remove(&proc_id)
    }

    /// Whether `proc_id` is currently registered.
    #[must_use]
    pub fn contains(&self, proc_id: ProcId) -> bool {
        self.entries.contains_key(&proc_id)
    }

    /// All currently registered process ids.
    pub fn ids(&self) -> impl Iterator<Item = ProcId> + '_ {
        self.entries.keys().copied()
    }
}

/// Open a PTY pair, spawn `/bin/sh -c <command>` as the slave-side child,
/// put the master into raw mode, and spawn a reader thread that forwards
/// output through `event_tx`.
///
/// # Errors
///
/// Returns [`BridgeError::ProcessSpawnError`] if the PTY cannot be opened
/// or the command fails to spawn.
pub fn spawn(proc_id: ProcId, command: &str, event_tx: UnboundedSender<PtyEvent>) -> Result<ProcessEntry, BridgeError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
        .map_err(|e| BridgeError::ProcessSpawnError(format!("openpty: {e}")))?;

    set_raw_mode(pair.master.as_ref());

    let mut cmd = CommandBuilder::new("/bin/sh");
    cmd.arg("-c");
    cmd.arg(command);

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| BridgeError::ProcessSpawnError(format!("spawn {command:?}: {e}")))?;

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| BridgeError::ProcessSpawnError(format!("take_writer: {e}")))?;
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| BridgeError::ProcessSpawnError(format!("clone_reader: {e}")))?;

    spawn_reader_thread(proc_id, reader, event_tx);

    info!("spawned process {proc_id} running {command:?}");
    Ok(ProcessEntry { writer, child, master: pair.master })
}

fn spawn_reader_thread(proc_id: ProcId, mut reader: Box<dyn Read + Send>, event_tx: UnboundedSender<PtyEvent>) {
    thread::spawn(move || {
        let mut buf = [0_u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("pty reader for process {proc_id} hit EOF");
                    let _ = event_tx.send(PtyEvent::Closed { proc_id, exit_code: None });
                    break;
                }
                Ok(n) => {
                    if event_tx.send(PtyEvent::Output { proc_id, bytes: buf[..n].to_vec() }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("pty read error for process {proc_id}: {e}");
                    let _ = event_tx.send(PtyEvent::Closed { proc_id, exit_code: None });
                    break;
                }
            }
        }
    });
}

#[cfg(unix)]
fn set_raw_mode(master: &dyn MasterPty) {
    let Some(fd) = master.as_raw_fd() else {
        warn!("could not obtain PTY master fd for raw-mode adjustment");
        return;
    };
    // SAFETY: fd is a valid, open PTY master fd owned by `master` for the
    // duration of this call; tcgetattr/tcsetattr do not retain it.
    unsafe {
        raw_mode_via_termios(fd);
    }
}

#[cfg(not(unix))]
fn set_raw_mode(_master: &dyn MasterPty) {}

#[cfg(unix)]
#[allow(unsafe_op_in_unsafe_fn, reason = "single termios syscall pair, caller documents fd validity")]
unsafe fn raw_mode_via_termios(fd: std::os::fd::RawFd) {
    let mut term: libc::termios = std::mem::zeroed();
    if libc::tcgetattr(fd, &mut term) != 0 {
        warn!("tcgetattr failed for pty fd {fd}");
        return;
    }
    // Disable echo and canonical-mode line buffering so writes are not
    // re-echoed and are not size-limited by the line discipline.
    term.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
    term.c_iflag &= !(libc::IXON | libc::ICRNL | libc::BRKINT | libc::INPCK | libc::ISTRIP);
    term.c_oflag &= !libc::OPOST;
    term.c_cc[libc::VMIN] = 1;
    term.c_cc[libc::VTIME] = 0;
    if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
        warn!("tcsetattr failed for pty fd {fd}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn spawn_and_read_hello() {
        let (tx, mut rx) = unbounded_channel();
        let mut entry = spawn(1, "echo hello", tx).expect("spawn should succeed");
        let mut collected = Vec::new();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(PtyEvent::Output { bytes, .. }) => collected.extend(bytes),
                Ok(PtyEvent::Closed { .. }) => break,
                Err(_) => thread::sleep(std::time::Duration::from_millis(10)),
            }
        }
        let text = String::from_utf8_lossy(&collected);
        assert!(text.contains("hello"), "expected output to contain hello, got {text:?}");
        let _ = entry.kill();
    }

    #[test]
    fn process_table_tracks_insert_and_remove() {
        let (tx, _rx) = unbounded_channel();
        let entry = spawn(7, "true", tx).expect("spawn should succeed");
        let mut table = ProcessTable::new();
        table.insert(7, entry);
        assert!(table.contains(7));
        assert!(table.remove(7).is_some());
        assert!(!table.contains(7));
    }
}
