/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cross-thread stop request for a running director.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

/// Result of [`StopHandle::wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The deadline passed.
    Elapsed,
    /// A stop was requested while waiting.
    Stopped,
}

#[derive(Debug, Default)]
struct StopState {
    requested: Mutex<bool>,
    signal: Condvar,
}

/// Shared flag that asks a director to stop between slots.
///
/// Cloning yields another handle to the same flag, so one clone can live on
/// a signal-handling thread while the director runs elsewhere.  A request
/// also wakes a director that is blocked in a real-time wait.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    state: Arc<StopState>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        let mut requested = self
            .state
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *requested = true;
        self.state.signal.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        *self
            .state
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Withdraw a previous request so the director can be resumed.
    pub fn clear(&self) {
        *self
            .state
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Block until `deadline` or until a stop is requested, whichever comes
    /// first.
    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome {
        let mut requested = self
            .state
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *requested {
                return WaitOutcome::Stopped;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Elapsed;
            }
            // spurious wakeups just go round again
            requested = self
                .state
                .signal
                .wait_timeout(requested, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
