//! One-shot completion gates chaining the commit slots of a job.
//!
//! A gate starts open-ended ("not yet closed") and is closed exactly once;
//! any number of waiters are released when that happens and every later wait
//! returns immediately. The closing side is a [`GateCloser`] that closes the
//! gate when dropped, so a slot closes its gate on every exit path, including
//! early returns, panics and task aborts.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Waiting side of a gate.
#[derive(Debug, Clone)]
pub struct Gate {
    // A token that is never linked to the shutdown signal; "cancelled" reads as "closed".
    signal: CancellationToken,
}

/// Closing side of a gate, owned by the slot the gate belongs to.
#[derive(Debug)]
pub struct GateCloser {
    _guard: DropGuard,
}

impl Gate {
    /// Creates a gate together with the closer that owns it.
    pub fn new() -> (Gate, GateCloser) {
        let signal = CancellationToken::new();
        let closer = GateCloser {
            _guard: signal.clone().drop_guard(),
        };
        (Gate { signal }, closer)
    }

    /// Creates an already-closed gate, used as the first slot's predecessor.
    pub fn closed() -> Gate {
        let signal = CancellationToken::new();
        signal.cancel();
        Gate { signal }
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Waits until the gate is closed.
    pub async fn wait(&self) {
        self.signal.cancelled().await
    }
}

impl GateCloser {
    /// Closes the gate now instead of at drop.
    pub fn close(self) {}
}
