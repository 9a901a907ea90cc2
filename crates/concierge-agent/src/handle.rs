//! A cloneable handle for observing a session from external code.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable handle for observing a session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
    pub(crate) is_busy: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            is_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the single in-flight slot. Returns `None` when a reply is
    /// already being generated.
    pub(crate) fn try_begin(&self) -> Option<BusyGuard> {
        self.is_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                handle: self.clone(),
            })
    }

    /// Wait until the session is idle (no reply pending).
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_busy.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wait until the session becomes idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_busy.load(Ordering::Acquire) {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Whether a reply is currently being generated.
    pub fn is_busy(&self) -> bool {
        self.is_busy.load(Ordering::Acquire)
    }
}

/// Releases the in-flight slot on drop
pub(crate) struct BusyGuard {
    handle: SessionHandle,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.handle.is_busy.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
    }
}
