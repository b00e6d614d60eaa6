// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative shutdown signal.
//!
//! One `Shutdown` is cloned into every component that blocks: the coordinator
//! checks it between state-machine steps, adapters check it between archived
//! roots, and `wait()` is selected against sleeps and subprocess waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

/// Clonable shutdown flag with async waiters.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag and wake all waiters. Idempotent.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once `trigger` has been called. Returns immediately if it
    /// already was.
    ///
    /// `notify_waiters` stores no permit, so the future must be registered
    /// with `enable` before the final flag check; a trigger landing after
    /// that check is then guaranteed to wake us.
    pub async fn wait(&self) {
        if self.is_triggered() {
            return;
        }
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
