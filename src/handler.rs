//! The capability interface that breaks the Proxy↔ProcRunner reference
//! cycle: `ProcRunner` references the `Proxy` only through a small `stop`
//! handle, and `Proxy` references `ProcRunner` only through this trait.

use async_trait::async_trait;

/// What the Proxy calls into when a descriptor produces data.
#[async_trait]
pub trait Handler: Send {
    /// Raw bytes arrived from the editor socket (up to one read's worth).
    /// The handler owns its own line reassembly and NetBeans parsing so
    /// that all events parsed from this one read can be deferred and
    /// dispatched as a single batch, per the protocol's ordering guarantee.
    async fn from_vim(&mut self, bytes: &[u8]);

    /// A complete line arrived from a process's PTY, identified by its
    /// application-assigned `ProcId`.
    async fn from_proc(&mut self, proc_id: u64, line: &str);

    /// The PTY for `proc_id` hit a read error or EOF and was deregistered;
    /// give the handler a chance to clean up its process-table entry.
    async fn proc_closed(&mut self, proc_id: u64, exit_code: Option<i32>);
}

/// A handle the `Proxy` exposes so its `Handler` can request loop
/// termination without holding a reference back to the `Proxy` itself.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl StopHandle {
    /// Create a fresh, not-yet-stopped handle.
    #[must_use]
    pub fn new() -> Self {
        StopHandle { flag: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)) }
    }

    /// Request that the owning `Proxy` stop its loop. Takes effect within
    /// one readiness-wait timeout.
    pub fn stop(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether `stop()` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_handle_reflects_stop_call() {
        let handle = StopHandle::new();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn stop_handle_clones_share_state() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        clone.stop();
        assert!(handle.is_stopped());
    }
}
