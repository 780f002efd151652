//! Cooperative stop signal
//!
//! A cloneable flag checked at loop boundaries. Blocking code (capture loop,
//! reconnect backoff) waits on it with [`StopSignal::wait_timeout`]; async code
//! (reporter backoff) awaits [`StopSignal::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
    notify: Notify,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.cvar.notify_all();
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Block the current thread for up to `timeout`.
    ///
    /// Returns `true` as soon as the signal fires, `false` when the timeout
    /// elapsed without it.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .cvar
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Resolve once the signal has fired.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_expires() {
        let stop = StopSignal::new();
        let start = Instant::now();
        assert!(!stop.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_timeout_wakes_on_trigger() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        let start = Instant::now();
        assert!(stop.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.trigger();
        });

        tokio::time::timeout(Duration::from_secs(2), stop.cancelled())
            .await
            .expect("signal should fire");
        assert!(stop.is_triggered());
    }

    #[tokio::test]
    async fn test_cancelled_after_trigger_is_immediate() {
        let stop = StopSignal::new();
        stop.trigger();
        stop.trigger();
        tokio::time::timeout(Duration::from_millis(100), stop.cancelled())
            .await
            .expect("already triggered");
    }
}
