//! Buffer/sequence allocators, buffer registry, reply-callback map, and the
//! NetBeans operations exposed to [`crate::proc_runner::ProcRunner`].

use std::collections::HashMap;
use std::path::Path;

use log::{error, trace, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::escape::escape;
use crate::constants::{FIRST_BUFFER_ID, FIRST_SEQ_ID};

/// Editor-side buffer handle allocated by the engine.
pub type BufferId = u64;
/// Monotonically increasing identifier correlating a function with its reply.
pub type SeqId = u64;

/// A one-shot reply continuation: receives the reply's raw argument string.
pub type ReplyCallback = Box<dyn FnOnce(&str) + Send>;

/// Addresses the editor globally rather than a specific buffer (used for
/// `startAtomic`/`endAtomic`/`getCursor`).
pub const GLOBAL_BUF_ID: BufferId = 0;

/// The NetBeans side of the session: allocators, buffer registry, reply
/// callbacks, and frame formatting/writing.
pub struct NetBeansEngine {
    next_buf: BufferId,
    next_seq: SeqId,
    /// `None` means "created, no file yet" (a bare `create()`).
    buffers: HashMap<BufferId, Option<String>>,
    reply_callbacks: HashMap<SeqId, ReplyCallback>,
    out_tx: UnboundedSender<String>,
}

impl std::fmt::Debug for NetBeansEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetBeansEngine")
            .field("next_buf", &self.next_buf)
            .field("next_seq", &self.next_seq)
            .field("buffers", &self.buffers)
            .field("pending_replies", &self.reply_callbacks.len())
            .finish()
    }
}

impl NetBeansEngine {
    /// Create a fresh engine. `out_tx` delivers formatted frames to the
    /// task that owns the editor socket write half.
    #[must_use]
    pub fn new(out_tx: UnboundedSender<String>) -> Self {
        NetBeansEngine {
            next_buf: FIRST_BUFFER_ID,
            next_seq: FIRST_SEQ_ID,
            buffers: HashMap::new(),
            reply_callbacks: HashMap::new(),
            out_tx,
        }
    }

    fn alloc_buf(&mut self) -> BufferId {
        let id = self.next_buf;
        self.next_buf += 1;
        id
    }

    fn alloc_seq(&mut self) -> SeqId {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn write_frame(&self, buf_id: BufferId, name: &str, sep: char, seq: SeqId, args: &str) {
        let line = if args.is_empty() {
            format!("{buf_id}:{name}{sep}{seq}\n")
        } else {
            format!("{buf_id}:{name}{sep}{seq} {args}\n")
        };
        if self.out_tx.send(line).is_err() {
            warn!("NetBeans engine write after editor socket closed");
        }
    }

    /// Send a fire-and-forget command. Allocates and immediately discards a
    /// `SeqId` (no reply is expected).
    fn send_command(&mut self, buf_id: BufferId, name: &str, args: &str) -> SeqId {
        let seq = self.alloc_seq();
        self.write_frame(buf_id, name, '!', seq, args);
        seq
    }

    /// Send a function expecting exactly one reply, registering `callback`
    /// under the allocated seq.
    ///
    /// # Panics (programming error, not a runtime condition)
    ///
    /// Never panics, but registering a second callback for a seq that is
    /// still live is impossible by construction since seqs are never
    /// reused while pending.
    fn send_function(&mut self, buf_id: BufferId, name: &str, args: &str, callback: ReplyCallback) -> SeqId {
        let seq = self.alloc_seq();
        if self.reply_callbacks.insert(seq, callback).is_some() {
            error!("duplicate reply callback registration for seq {seq}");
        }
        self.write_frame(buf_id, name, '/', seq, args);
        seq
    }

    /// Dispatch a reply line's raw arguments to its registered callback, if
    /// any. Unknown seqs are silently dropped, matching the protocol's
    /// "at most one callback invocation per seq" invariant.
    pub fn on_reply(&mut self, seq: SeqId, raw_args: &str) {
        if let Some(callback) = self.reply_callbacks.remove(&seq) {
            callback(raw_args);
        } else {
            trace!("reply for unregistered seq {seq}, dropping");
        }
    }

    /// `create()` — allocate a bufId, register it with no filename, send
    /// the `create` command.
    pub fn create(&mut self) -> BufferId {
        let id = self.alloc_buf();
        self.buffers.insert(id, None);
        self.send_command(id, "create", "");
        id
    }

    /// `editFile(filename)` — allocate a bufId, register it with
    /// `filename`, send `editFile "<f>"`. Preferred over `create` because
    /// the id survives an editor-side reopen.
    pub fn edit_file(&mut self, filename: &str) -> BufferId {
        let id = self.alloc_buf();
        self.buffers.insert(id, Some(filename.to_string()));
        self.send_command(id, "editFile", &format!("\"{}\"", escape(filename)));
        id
    }

    /// `setFullName(bufId, filename)`.
    pub fn set_full_name(&mut self, buf_id: BufferId, filename: &str) {
        self.buffers.insert(buf_id, Some(filename.to_string()));
        self.send_command(buf_id, "setFullName", &format!("\"{}\"", escape(filename)));
    }

    /// `setDot(bufId, offset)`.
    pub fn set_dot(&mut self, buf_id: BufferId, offset: u64) {
        self.send_command(buf_id, "setDot", &offset.to_string());
    }

    /// `initDone(bufId)` — re-fires the editor's post-read hook.
    pub fn init_done(&mut self, buf_id: BufferId) {
        self.send_command(buf_id, "initDone", "");
    }

    /// `startAtomic()` — addressed globally; suppresses UI refresh until
    /// the matching `endAtomic`.
    pub fn start_atomic(&mut self) {
        self.send_command(GLOBAL_BUF_ID, "startAtomic", "");
    }

    /// `endAtomic()`.
    pub fn end_atomic(&mut self) {
        self.send_command(GLOBAL_BUF_ID, "endAtomic", "");
    }

    /// `setReadOnly(bufId)`.
    pub fn set_read_only(&mut self, buf_id: BufferId) {
        self.send_command(buf_id, "setReadOnly", "");
    }

    /// `stopDocumentListen(bufId)`.
    pub fn stop_document_listen(&mut self, buf_id: BufferId) {
        self.send_command(buf_id, "stopDocumentListen", "");
    }

    /// `netbeansBuffer(bufId, bool)`.
    pub fn netbeans_buffer(&mut self, buf_id: BufferId, flag: bool) {
        let arg = if flag { "T" } else { "F" };
        self.send_command(buf_id, "netbeansBuffer", arg);
    }

    /// `putBufferNumber(bufId, filename)` — reconciles an editor-side
    /// buffer with an engine-side id. A buffer discovered this way (some
    /// file the user opened directly, not inbox/outbox) is immediately
    /// un-flagged as a NetBeans buffer and has document-listen turned off,
    /// so this bridge never reacts to edits in it.
    pub fn put_buffer_number(&mut self, buf_id: BufferId, filename: &str) {
        self.buffers.insert(buf_id, Some(filename.to_string()));
        self.send_command(buf_id, "putBufferNumber", &format!("\"{}\"", escape(filename)));
        self.netbeans_buffer(buf_id, false);
        self.stop_document_listen(buf_id);
    }

    /// `insert(bufId, offset, text)` — escapes `\` then `"` in `text`.
    pub fn insert(&mut self, buf_id: BufferId, offset: u64, text: &str) {
        let escaped = escape(text);
        self.send_command(buf_id, "insert", &format!("{offset} \"{escaped}\""));
    }

    /// `getCursor(cb)` — sends a function frame; `cb` receives
    /// `(bufId, lnum, column, offset)` parsed from the four
    /// space-separated integers in the reply.
    pub fn get_cursor(&mut self, callback: impl FnOnce(u64, u64, u64, u64) + Send + 'static) {
        let wrapped: ReplyCallback = Box::new(move |raw_args: &str| {
            let mut parts = raw_args.split_whitespace();
            let parsed = (|| -> Option<(u64, u64, u64, u64)> {
                Some((
                    parts.next()?.parse().ok()?,
                    parts.next()?.parse().ok()?,
                    parts.next()?.parse().ok()?,
                    parts.next()?.parse().ok()?,
                ))
            })();
            if let Some((buf_id, lnum, column, offset)) = parsed {
                callback(buf_id, lnum, column, offset);
            } else {
                error!("malformed getCursor reply: {raw_args:?}");
            }
        });
        self.send_function(GLOBAL_BUF_ID, "getCursor", "", wrapped);
    }

    /// Buffer-discovery policy on `fileOpened`: search the registry for an
    /// entry whose filename's basename matches `filename`'s basename
    /// (entries registered with no filename are skipped). If none
    /// matches, allocate a new bufId and call `putBufferNumber`.
    pub fn on_file_opened(&mut self, filename: &str) -> BufferId {
        let target_basename = Path::new(filename).file_name();
        let found = self.buffers.iter().find_map(|(id, name)| {
            let name = name.as_ref()?;
            if Path::new(name).file_name() == target_basename {
                Some(*id)
            } else {
                None
            }
        });
        if let Some(id) = found {
            return id;
        }
        let id = self.alloc_buf();
        self.buffers.insert(id, Some(filename.to_string()));
        self.put_buffer_number(id, filename);
        id
    }

    /// `killed` event handler: drop the registry entry. `nextBuf` is never
    /// decremented, so ids are never reused within a session.
    pub fn on_killed(&mut self, buf_id: BufferId) {
        self.buffers.remove(&buf_id);
    }

    /// Current allocator state, exposed for testing the monotonicity
    /// invariant without a full round of sends.
    #[must_use]
    #[cfg(test)]
    pub fn peek_next_buf(&self) -> BufferId {
        self.next_buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn engine() -> (NetBeansEngine, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (NetBeansEngine::new(tx), rx)
    }

    #[test]
    fn buffer_ids_are_monotonic_and_never_reused() {
        let (mut engine, _rx) = engine();
        let a = engine.create();
        let b = engine.create();
        assert!(b > a);
        engine.on_killed(a);
        let c = engine.create();
        assert!(c > b, "killed ids must not be reused");
    }

    #[test]
    fn seq_ids_are_monotonic() {
        let (mut engine, mut rx) = engine();
        engine.create();
        engine.create();
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let seq_of = |line: &str| -> u64 {
            line.split(['!', '/']).nth(1).unwrap().split_whitespace().next().unwrap().parse().unwrap()
        };
        assert!(seq_of(&second) > seq_of(&first));
    }

    #[test]
    fn reply_callback_invoked_once_and_removed() {
        let (mut engine, _rx) = engine();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        engine.get_cursor(move |_, _, _, _| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let seq = engine.next_seq - 1;
        engine.on_reply(seq, "1 2 3 4");
        engine.on_reply(seq, "1 2 3 4"); // second reply for same seq: no-op
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(engine.reply_callbacks.is_empty());
    }

    #[test]
    fn unknown_seq_reply_is_silently_dropped() {
        let (mut engine, _rx) = engine();
        engine.on_reply(999, "whatever"); // must not panic
    }

    #[test]
    fn file_opened_matches_existing_buffer_by_basename() {
        let (mut engine, _rx) = engine();
        let id = engine.edit_file("/home/user/project/foo.txt");
        let resolved = engine.on_file_opened("/tmp/reopen/foo.txt");
        assert_eq!(resolved, id);
    }

    #[test]
    fn file_opened_allocates_new_buffer_when_unmatched() {
        let (mut engine, _rx) = engine();
        let before = engine.peek_next_buf();
        let resolved = engine.on_file_opened("never_seen.txt");
        assert!(resolved >= before);
    }

    #[test]
    fn s6_atomic_bracket_frame_sequence() {
        let (mut engine, mut rx) = engine();
        let inbox = engine.edit_file("vim-async-beans.in");
        let _ = rx.try_recv(); // editFile frame
        engine.start_atomic();
        engine.insert(inbox, 99999, "hello");
        engine.init_done(inbox);
        engine.end_atomic();
        let frames: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(frames.len(), 4);
        assert!(frames[0].contains("startAtomic!"));
        assert!(frames[1].contains(":insert/"));
        assert!(frames[1].contains("99999 \"hello\""));
        assert!(frames[2].contains("initDone!"));
        assert!(frames[3].contains("endAtomic!"));
    }
}
