//! The readiness-multiplexer: one duplex editor socket and an evolving set
//! of PTY output streams, fanned in through channels and drained by a
//! single consuming task so the whole loop observes one serialized
//! ordering, per the concurrency model's single-consumer requirement.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::interval;

use crate::constants::{READ_CHUNK_SIZE, SELECT_TIMEOUT};
use crate::error::BridgeError;
use crate::handler::{Handler, StopHandle};
use crate::line_buffer::LineBuffer;
use crate::pty::PtyEvent;

/// Owns the editor socket and dispatches readable data, PTY output, and
/// outbound NetBeans frames to a single `Handler`.
pub struct Proxy<H: Handler> {
    socket: TcpStream,
    handler: H,
    stop_handle: StopHandle,
    pty_event_rx: UnboundedReceiver<PtyEvent>,
    pty_line_buffers: HashMap<u64, LineBuffer>,
    out_rx: UnboundedReceiver<String>,
}

impl<H: Handler> Proxy<H> {
    /// Construct a Proxy over an already-accepted editor connection.
    /// `out_rx` receives formatted NetBeans frames from the engine the
    /// handler owns; `pty_event_rx` receives output/close notifications
    /// from every process spawned so far (and any spawned later).
    #[must_use]
    pub fn new(
        socket: TcpStream,
        handler: H,
        stop_handle: StopHandle,
        pty_event_rx: UnboundedReceiver<PtyEvent>,
        out_rx: UnboundedReceiver<String>,
    ) -> Self {
        Proxy {
            socket,
            handler,
            stop_handle,
            pty_event_rx,
            pty_line_buffers: HashMap::new(),
            out_rx,
        }
    }

    /// Enter the dispatch loop. Returns once `stop()` was observed (bounded
    /// by [`SELECT_TIMEOUT`]) or the editor socket fails.
    ///
    /// # Errors
    ///
    /// Returns an error only for a fatal editor-socket I/O failure; PTY
    /// failures are isolated to their owning process and never propagate
    /// here.
    pub async fn run(mut self) -> Result<()> {
        let mut tick = interval(SELECT_TIMEOUT);
        let mut read_buf = vec![0_u8; READ_CHUNK_SIZE];

        loop {
            if self.stop_handle.is_stopped() {
                info!("proxy loop observed stop request");
                break;
            }

            tokio::select! {
                biased;

                result = self.socket.read(&mut read_buf) => {
                    match result {
                        Ok(0) => {
                            info!("editor socket closed");
                            break;
                        }
                        Ok(n) => {
                            self.handler.from_vim(&read_buf[..n]).await;
                        }
                        Err(e) => {
                            error!("editor socket read failed: {e}");
                            return Err(BridgeError::socket_io(e)).context("editor socket read");
                        }
                    }
                }

                Some(event) = self.pty_event_rx.recv() => {
                    self.dispatch_pty_event(event).await;
                    while let Ok(more) = self.pty_event_rx.try_recv() {
                        self.dispatch_pty_event(more).await;
                    }
                }

                Some(frame) = self.out_rx.recv() => {
                    self.write_frame(&frame).await;
                    while let Ok(more) = self.out_rx.try_recv() {
                        self.write_frame(&more).await;
                    }
                }

                _ = tick.tick() => {
                    // benign wakeup: re-check the stop flag at loop top
                }
            }
        }

        Ok(())
    }

    async fn dispatch_pty_event(&mut self, event: PtyEvent) {
        match event {
            PtyEvent::Output { proc_id, bytes } => {
                let buf = self.pty_line_buffers.entry(proc_id).or_default();
                let mut lines = Vec::new();
                buf.add(&bytes, |line| lines.push(line.to_string()));
                for line in lines {
                    self.handler.from_proc(proc_id, &line).await;
                }
            }
            PtyEvent::Closed { proc_id, exit_code } => {
                self.pty_line_buffers.remove(&proc_id);
                debug!("pty for process {proc_id} closed (exit_code={exit_code:?})");
                self.handler.proc_closed(proc_id, exit_code).await;
            }
        }
    }

    async fn write_frame(&mut self, frame: &str) {
        if let Err(e) = self.socket.write_all(frame.as_bytes()).await {
            error!("failed writing frame to editor socket: {e}");
        }
    }
}

/// Create the channel pair a `ProcRunner`'s engine writes frames into and
/// a `Proxy` reads from.
#[must_use]
pub fn out_channel() -> (UnboundedSender<String>, UnboundedReceiver<String>) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Create the channel pair spawned processes' reader threads feed into
/// and a `Proxy` reads from.
#[must_use]
pub fn pty_event_channel() -> (UnboundedSender<PtyEvent>, UnboundedReceiver<PtyEvent>) {
    tokio::sync::mpsc::unbounded_channel()
}
