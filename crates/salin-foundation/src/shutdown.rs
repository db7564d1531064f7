use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;

/// Cooperative shutdown token shared by every stage of the pipeline.
///
/// Set exactly once, never cleared. Capture, the recognition loop, and
/// speech-output tasks all hold a clone and check it at their poll points.
#[derive(Clone)]
pub struct ShutdownToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Idempotent: the first call wins, later calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Take the lock so a thread between its flag check and its
        // condvar wait cannot miss the wakeup.
        drop(self.inner.lock.lock());
        self.inner.cvar.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Async wait until the token is cancelled.
    pub async fn wait(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Blocking wait, bounded by `timeout`. Returns true once cancelled,
    /// whether that happened before the call or during the wait. Used for
    /// cancellable sleeps: retry delays and the recognition loop's poll.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let mut guard = self.inner.lock.lock();
        if self.is_cancelled() {
            return true;
        }
        self.inner.cvar.wait_for(&mut guard, timeout);
        self.is_cancelled()
    }
}

pub struct ShutdownHandler {
    token: ShutdownToken,
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self {
            token: ShutdownToken::new(),
        }
    }

    /// Installs the Ctrl-C watcher and panic hook, returning the token
    /// handed to every pipeline component.
    pub async fn install(self) -> ShutdownToken {
        let token = self.token.clone();

        tokio::spawn(async move {
            if signal::ctrl_c().await.is_err() {
                tracing::error!("Failed to install Ctrl-C handler");
                return;
            }
            tracing::info!("Shutdown requested via Ctrl-C");
            token.cancel();
        });

        let original_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            tracing::error!("PANIC: {}", panic_info);
            eprintln!("Application panicked: {}", panic_info);
            original_panic(panic_info);
        }));

        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn cancel_is_idempotent() {
        let token = ShutdownToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn wait_timeout_returns_immediately_when_already_cancelled() {
        let token = ShutdownToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn wait_timeout_elapses_when_not_cancelled() {
        let token = ShutdownToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wait_timeout_wakes_on_cancel_from_another_thread() {
        let token = ShutdownToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let cancelled = waiter.wait_timeout(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        let (cancelled, elapsed) = handle.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn async_wait_observes_cancel() {
        let token = ShutdownToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("wait() should return after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn async_wait_returns_when_cancelled_before_call() {
        let token = ShutdownToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .expect("wait() should not block on an already-cancelled token");
    }
}
