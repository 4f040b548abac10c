//! The application core: well-known inbox/outbox buffers, the process
//! table, pause/flow-control, and the embedded command protocol.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::app_protocol::{self, AppCommand};
use crate::constants::END_OF_BUFFER_OFFSET;
use crate::handler::{Handler, StopHandle};
use crate::line_buffer::LineBuffer;
use crate::netbeans::engine::BufferId;
use crate::netbeans::event::Event;
use crate::netbeans::parser::{ClassifiedLine, EventStack, NetBeansParser};
use crate::netbeans::NetBeansEngine;
use crate::pty::{self, ProcId, ProcessTable, PtyEvent};

/// Pause/resume flow control state.
#[derive(Debug, Default)]
struct PauseState {
    paused: bool,
    queued: VecDeque<String>,
    pause_after: u64,
    pause_after_proc_id: Option<ProcId>,
}

/// The application core built atop [`NetBeansEngine`].
pub struct ProcRunner {
    engine: NetBeansEngine,
    processes: ProcessTable,
    pty_event_tx: UnboundedSender<PtyEvent>,
    stop_handle: StopHandle,

    inbox_id: Option<BufferId>,
    outbox_id: Option<BufferId>,
    setup_done: bool,

    inserts: HashMap<BufferId, Vec<String>>,
    pause: PauseState,

    socket_lines: LineBuffer,
    event_stack: EventStack,

    inbox_filename: String,
    outbox_filename: String,
}

impl std::fmt::Debug for ProcRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcRunner")
            .field("inbox_id", &self.inbox_id)
            .field("outbox_id", &self.outbox_id)
            .field("setup_done", &self.setup_done)
            .field("paused", &self.pause.paused)
            .finish_non_exhaustive()
    }
}

impl ProcRunner {
    /// Create a fresh `ProcRunner`. `pty_event_tx` is cloned into every
    /// spawned process's reader thread so its output reaches the Proxy's
    /// shared event channel.
    #[must_use]
    pub fn new(
        engine: NetBeansEngine,
        pty_event_tx: UnboundedSender<PtyEvent>,
        stop_handle: StopHandle,
        inbox_filename: String,
        outbox_filename: String,
    ) -> Self {
        ProcRunner {
            engine,
            processes: ProcessTable::new(),
            pty_event_tx,
            stop_handle,
            inbox_id: None,
            outbox_id: None,
            setup_done: false,
            inserts: HashMap::new(),
            pause: PauseState::default(),
            socket_lines: LineBuffer::new(),
            event_stack: EventStack::new(),
            inbox_filename,
            outbox_filename,
        }
    }

    /// `setupInOutBuffers`: runs exactly once per session, on the first
    /// `startupDone` event.
    fn setup_in_out_buffers(&mut self) {
        if self.setup_done {
            return;
        }
        self.setup_done = true;
        let inbox = self.engine.edit_file(&self.inbox_filename);
        self.engine.set_read_only(inbox);
        self.engine.stop_document_listen(inbox);
        let outbox = self.engine.edit_file(&self.outbox_filename);
        self.engine.create();
        self.engine.init_done(inbox);
        self.inbox_id = Some(inbox);
        self.outbox_id = Some(outbox);
        info!("inbox={inbox} outbox={outbox} buffers established");
    }

    fn on_insert(&mut self, buf_id: BufferId, text: &str) {
        let stripped = text.trim();
        if stripped.is_empty() || stripped == "\\n" || stripped == "\\t" {
            return;
        }
        self.inserts.entry(buf_id).or_default().push(stripped.to_string());

        if Some(buf_id) == self.outbox_id {
            if let Some(last) = self.inserts.get_mut(&buf_id).and_then(Vec::pop) {
                self.dispatch_app_command(&last);
            }
        }
    }

    fn dispatch_app_command(&mut self, line: &str) {
        match app_protocol::parse(line) {
            Some(AppCommand::Exec { id, cmd }) => self.handle_exec(id, &cmd),
            Some(AppCommand::Kill { id }) => self.handle_kill(id),
            Some(AppCommand::Data { id, payload }) => self.handle_data(id, &payload),
            Some(AppCommand::DataAndPause { id, pause_after, payload }) => {
                self.pause.pause_after = pause_after;
                self.pause.pause_after_proc_id = Some(id);
                self.handle_data(id, &payload);
            }
            Some(AppCommand::Pause) => {
                self.pause.paused = true;
            }
            Some(AppCommand::Continue) => self.handle_continue(),
            None => {
                warn!("embedded protocol error, discarding line: {line:?}");
            }
        }
    }

    fn handle_exec(&mut self, id: ProcId, cmd: &str) {
        match pty::spawn(id, cmd, self.pty_event_tx.clone()) {
            Ok(entry) => {
                self.processes.insert(id, entry);
                self.send_to_vim(&app_protocol::format_started(id));
            }
            Err(e) => {
                error!("EXEC {id} failed to spawn {cmd:?}: {e}");
            }
        }
    }

    fn handle_kill(&mut self, id: ProcId) {
        let Some(mut entry) = self.processes.remove(id) else {
            debug!("KILL for unknown process {id}, ignoring");
            return;
        };
        if let Err(e) = entry.kill() {
            warn!("failed to kill process {id}: {e}");
        }
        self.send_to_vim(&app_protocol::format_terminated(id));
    }

    fn handle_data(&mut self, id: ProcId, payload: &str) {
        match self.processes.get_mut(id) {
            Some(entry) => {
                if let Err(e) = entry.write_data(payload) {
                    warn!("write to process {id} failed: {e}");
                }
            }
            None => warn!("DATA for unknown process {id}, discarding"),
        }
    }

    fn handle_continue(&mut self) {
        self.pause.paused = false;
        let queued: Vec<String> = self.pause.queued.drain(..).collect();
        for msg in queued {
            self.send_to_vim_now(&msg);
        }
    }

    /// For each complete process output line, format the DATA frame and
    /// deliver it (queuing if paused).
    fn on_proc_line(&mut self, proc_id: ProcId, line: &str) {
        let frame = app_protocol::format_data(proc_id, line);
        self.send_to_vim(&frame);
        self.maybe_auto_pause(proc_id);
    }

    fn maybe_auto_pause(&mut self, proc_id: ProcId) {
        if self.pause.pause_after_proc_id != Some(proc_id) || self.pause.pause_after == 0 {
            return;
        }
        self.pause.pause_after -= 1;
        if self.pause.pause_after == 0 {
            self.pause.paused = true;
            self.pause.pause_after_proc_id = None;
        }
    }

    /// Queue `msg` if paused, else deliver it immediately.
    fn send_to_vim(&mut self, msg: &str) {
        if self.pause.paused {
            self.pause.queued.push_back(msg.to_string());
            return;
        }
        self.send_to_vim_now(msg);
    }

    /// Bracket an insert with `startAtomic`/`endAtomic` and deliver it to
    /// the inbox at the end-of-buffer sentinel offset, unconditionally
    /// (used both for live sends and for flushing the queue on CONTINUE).
    fn send_to_vim_now(&mut self, msg: &str) {
        let Some(inbox) = self.inbox_id else {
            warn!("send_to_vim before setup completed, dropping: {msg:?}");
            return;
        };
        self.engine.start_atomic();
        self.engine.insert(inbox, END_OF_BUFFER_OFFSET, msg.trim());
        self.engine.init_done(inbox);
        self.engine.end_atomic();
    }

    fn dispatch_event(&mut self, event: Event) {
        match event {
            Event::FileOpened { filename, .. } => {
                let _ = self.engine.on_file_opened(&filename);
            }
            Event::Insert { buf_id, text, .. } => self.on_insert(buf_id, &text),
            Event::Version { text, .. } => debug!("editor version: {text}"),
            Event::StartupDone { .. } => self.setup_in_out_buffers(),
            Event::Killed { buf_id } => self.engine.on_killed(buf_id),
            Event::Disconnect => {
                info!("editor disconnected, stopping proxy loop");
                self.stop_handle.stop();
            }
        }
    }
}

#[async_trait]
impl Handler for ProcRunner {
    async fn from_vim(&mut self, bytes: &[u8]) {
        let mut classified_lines = Vec::new();
        self.socket_lines.add(bytes, |line| classified_lines.push(line.to_string()));

        for line in classified_lines {
            match NetBeansParser::classify(&line) {
                Some(ClassifiedLine::Event { buf_id, name, seq, raw_args }) => {
                    let _ = seq; // events carry no reply correlation
                    match NetBeansParser::parse_event(buf_id, &name, &raw_args) {
                        Ok(Some(event)) => self.event_stack.push(event),
                        Ok(None) => {}
                        Err(e) => warn!("{e}"),
                    }
                }
                Some(ClassifiedLine::Reply { seq, raw_args }) => {
                    self.engine.on_reply(seq, &raw_args);
                }
                None => {}
            }
        }

        for event in self.event_stack.drain() {
            self.dispatch_event(event);
        }
    }

    async fn from_proc(&mut self, proc_id: u64, line: &str) {
        self.on_proc_line(proc_id, line);
    }

    async fn proc_closed(&mut self, proc_id: u64, _exit_code: Option<i32>) {
        if self.processes.remove(proc_id).is_some() {
            info!("process {proc_id} exited");
            self.send_to_vim(&app_protocol::format_terminated(proc_id));
        }
    }
}
