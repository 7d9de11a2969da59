//! Cooperative scan cancellation
//!
//! A cancelled token stops components from issuing new probes; probes already
//! in flight resolve or time out naturally. Partial results collected before
//! cancellation are kept, never discarded.

use tokio::sync::watch;

/// Create a linked handle/token pair for one scan run
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Caller-side handle that requests cancellation
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        // Receivers may all be gone once the scan finishes; that is fine.
        let _ = self.tx.send(true);
    }
}

/// Worker-side token polled before issuing each new probe
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A token that can never be cancelled
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}
