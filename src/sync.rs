//! Countdown latches and cooperative cancellation.
//!
//! Rust threads cannot be interrupted from outside, so every blocking wait in
//! this crate takes a [`CancellationToken`]. Cancelling a token wakes all
//! latches currently blocked on it (no polling) and makes them return
//! [`Error::Interrupted`]. Tokens form a tree: cancelling a parent cancels
//! every child created through [`CancellationToken::child_token`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LatchShared {
    count: Mutex<u64>,
    cond: Condvar,
}

impl LatchShared {
    fn wake(&self) {
        // Taking the lock orders the wake-up after a waiter's cancellation check.
        let _count = lock(&self.count);
        self.cond.notify_all();
    }
}

/// Countdown latch: waiters block until the count reaches zero.
pub struct CountDownLatch {
    shared: Arc<LatchShared>,
}

impl CountDownLatch {
    /// Create a latch that opens after `count` calls to [`count_down`](Self::count_down).
    pub fn new(count: u64) -> Self {
        Self {
            shared: Arc::new(LatchShared {
                count: Mutex::new(count),
                cond: Condvar::new(),
            }),
        }
    }

    /// Decrement the count, releasing waiters when it reaches zero.
    pub fn count_down(&self) {
        let mut count = lock(&self.shared.count);
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.shared.cond.notify_all();
            }
        }
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        *lock(&self.shared.count)
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when the latch opened, `Ok(false)` on timeout and
    /// `Err(Error::Interrupted)` when `cancel` fires first. A timeout too large
    /// to represent as an `Instant` waits without a deadline.
    pub fn wait_timeout(&self, timeout: Duration, cancel: &CancellationToken) -> Result<bool> {
        self.wait_until(Instant::now().checked_add(timeout), cancel)
    }

    /// Block until the count reaches zero, `deadline` passes, or `cancel` fires.
    ///
    /// A `None` deadline waits until the latch opens or is cancelled.
    pub fn wait_until(&self, deadline: Option<Instant>, cancel: &CancellationToken) -> Result<bool> {
        cancel.register(Arc::downgrade(&self.shared));

        let mut count = lock(&self.shared.count);
        loop {
            if *count == 0 {
                return Ok(true);
            }
            if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            match deadline {
                None => {
                    count = self
                        .shared
                        .cond
                        .wait(count)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    let remaining = deadline.saturating_duration_since(now);
                    count = self
                        .shared
                        .cond
                        .wait_timeout(count, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

impl std::fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("count", &self.count())
            .finish()
    }
}

#[derive(Default)]
struct TokenState {
    waiters: Vec<Weak<LatchShared>>,
    children: Vec<Weak<TokenInner>>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    state: Mutex<TokenState>,
}

impl TokenInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = std::mem::take(&mut *lock(&self.state));
        for waiter in state.waiters.iter().filter_map(Weak::upgrade) {
            waiter.wake();
        }
        for child in state.children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cooperative cancellation signal shared between a caller and its workers.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token cancelled whenever `self` is.
    pub fn child_token(&self) -> Self {
        let child = Self::new();
        {
            let mut state = lock(&self.inner.state);
            if !self.is_cancelled() {
                state.children.retain(|c| c.strong_count() > 0);
                state.children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }

    /// Fire the signal, waking every latch blocked on this token or its children.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Error::Interrupted)` if the signal has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Error::Interrupted` on cancellation.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        CountDownLatch::new(1).wait_timeout(duration, self).map(|_| ())
    }

    fn register(&self, waiter: Weak<LatchShared>) {
        let mut state = lock(&self.inner.state);
        if self.is_cancelled() {
            // cancel() already drained the list; the waiter checks the flag itself.
            return;
        }
        state.waiters.retain(|w| w.strong_count() > 0);
        state.waiters.push(waiter);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn latch_opens_after_count_downs() {
        let latch = Arc::new(CountDownLatch::new(3));
        let worker = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                for _ in 0..3 {
                    latch.count_down();
                }
            })
        };
        let opened = latch
            .wait_timeout(Duration::from_secs(5), &CancellationToken::new())
            .unwrap();
        worker.join().unwrap();
        assert!(opened);
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn latch_times_out_with_remaining_count() {
        let latch = CountDownLatch::new(2);
        latch.count_down();
        let opened = latch
            .wait_timeout(Duration::from_millis(20), &CancellationToken::new())
            .unwrap();
        assert!(!opened);
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn cancellation_wakes_blocked_waiter() {
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                token.cancel();
            })
        };
        let started = Instant::now();
        let result = CountDownLatch::new(1).wait_until(None, &token);
        canceller.join().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn child_tokens_follow_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
        assert!(parent.child_token().is_cancelled());
    }

    #[test]
    fn cancelling_child_leaves_parent_alone() {
        let parent = CancellationToken::new();
        parent.child_token().cancel();
        assert!(parent.check().is_ok());
    }

    #[test]
    fn unbounded_sleep_still_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(token.sleep(Duration::MAX), Err(Error::Interrupted)));

        let latch = CountDownLatch::new(0);
        assert!(latch.wait_timeout(Duration::MAX, &CancellationToken::new()).unwrap());
    }

    #[test]
    fn sleep_returns_after_duration() {
        let token = CancellationToken::new();
        let started = Instant::now();
        token.sleep(Duration::from_millis(10)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
