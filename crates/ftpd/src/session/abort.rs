//! Per-transfer abort signalling.
//!
//! ABORT arrives on a different context than the transfer it targets. Each
//! transfer arms a fresh [`CancellationToken`] and the guard disarms it when
//! the transfer ends, so an ABORT only ever reaches the transfer that was in
//! flight when it arrived.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared handle used to cancel the armed transfer, if any.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    armed: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortSignal {
    /// Create an idle signal.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a fresh token for a transfer that is about to start.
    pub fn arm(&self) -> ArmedTransfer {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        ArmedTransfer {
            signal: self.clone(),
            token,
        }
    }

    /// Cancel the armed transfer. Returns whether one was armed.
    pub fn abort(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                debug!("abort delivered to armed transfer");
                true
            }
            None => {
                debug!("abort with no transfer in flight");
                false
            }
        }
    }

    /// Whether a transfer is currently armed.
    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    fn disarm(&self) {
        self.slot().take();
    }
}

/// Token of the transfer in flight. Disarms the signal when dropped.
#[derive(Debug)]
pub struct ArmedTransfer {
    signal: AbortSignal,
    token: CancellationToken,
}

impl ArmedTransfer {
    /// Token to hand to the transfer loop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ArmedTransfer {
    fn drop(&mut self) {
        self.signal.disarm();
    }
}
