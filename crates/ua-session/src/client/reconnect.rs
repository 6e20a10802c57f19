// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Auto-reconnect timer.
//!
//! A single-shot delayed task bound to one session. Arming replaces any
//! previous arm; expiry runs the handler once and does not re-arm.
//!
//! The expiry check and the handler run under the same lock as
//! [`ReconnectTimer::disarm`] and [`ReconnectTimer::cancel`], so once either
//! returns the handler of a replaced arm can no longer run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type ExpiryHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TimerSlot {
    epoch: u64,
    pending: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl TimerSlot {
    fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// Cancellable single-shot timer.
pub struct ReconnectTimer {
    delay: Duration,
    runtime: Handle,
    handler: ExpiryHandler,
    slot: Arc<Mutex<TimerSlot>>,
}

impl ReconnectTimer {
    /// Creates an idle timer that calls `handler` on expiry.
    pub fn new(delay: Duration, runtime: Handle, handler: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay,
            runtime,
            handler: Arc::new(handler),
            slot: Arc::new(Mutex::new(TimerSlot::default())),
        }
    }

    /// Returns the fixed delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms the timer, replacing a pending arm.
    ///
    /// Returns `false` if the timer has been cancelled.
    pub fn start(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.cancelled {
            return false;
        }
        slot.clear();

        let epoch = slot.epoch;
        let delay = self.delay;
        let shared = Arc::clone(&self.slot);
        let handler = Arc::clone(&self.handler);

        slot.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let mut slot = shared.lock();
            if slot.cancelled || slot.epoch != epoch {
                return;
            }
            slot.pending = None;
            handler();
        }));

        tracing::trace!(delay_ms = delay.as_millis() as u64, "Reconnect timer armed");
        true
    }

    /// Cancels a pending arm. The timer can be armed again.
    pub fn disarm(&self) {
        self.slot.lock().clear();
    }

    /// Cancels permanently. No handler runs after this returns.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock();
        slot.cancelled = true;
        slot.clear();
    }

    /// Returns `true` while an arm is waiting to expire.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.slot.lock().cancelled
    }
}

impl fmt::Debug for ReconnectTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectTimer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
