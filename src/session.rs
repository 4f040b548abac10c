//! Bootstrap: bind, accept exactly one connection, wire up the engine,
//! process runner, and proxy, then run until disconnect.

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::handler::StopHandle;
use crate::netbeans::NetBeansEngine;
use crate::proc_runner::ProcRunner;
use crate::proxy::{self, Proxy};

/// A bound listener, accepted connection, and running proxy loop.
pub struct Session {
    config: Config,
}

impl Session {
    /// Create a session from a resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Session { config }
    }

    /// Bind the configured address, accept exactly one editor connection,
    /// and run the proxy loop to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound, the accept fails,
    /// or the proxy loop hits a fatal editor-socket error.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
        info!("listening on {addr}");

        let (socket, peer) = listener.accept().await.context("accepting editor connection")?;
        info!("editor connected from {peer}");

        let (out_tx, out_rx) = proxy::out_channel();
        let (pty_tx, pty_rx) = proxy::pty_event_channel();
        let stop_handle = StopHandle::new();

        let engine = NetBeansEngine::new(out_tx);
        let handler = ProcRunner::new(
            engine,
            pty_tx,
            stop_handle.clone(),
            self.config.inbox_filename.clone(),
            self.config.outbox_filename.clone(),
        );

        let proxy = Proxy::new(socket, handler, stop_handle, pty_rx, out_rx);
        proxy.run().await?;

        info!("session ended");
        Ok(())
    }
}
