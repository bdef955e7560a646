use crate::{config::WaitStrategy, token::CancelToken};
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{self, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// How long a parked call may sleep between polls of a cancellation token.
const POLL_SLICE: Duration = Duration::from_millis(1);

/// Why a blocking call stopped waiting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum WaitOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

/// A parking spot for threads blocked on ring progress.
///
/// Waiters register before sleeping and notifiers only take the lock when a
/// waiter is registered, so channels that never park never contend on it.
#[derive(Debug, Default)]
pub(crate) struct Monitor {
    waiters: AtomicUsize,
    lock: Mutex<()>,
    cv: Condvar,
}

impl Monitor {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    /// Wakes every parked waiter.
    ///
    /// The fence pairs with the one in [`park`]: whichever of the state
    /// change and the registration comes first in the fence order, the other
    /// side is guaranteed to observe it, so a waiter cannot check the
    /// condition, miss the change, and then sleep through the notification.
    ///
    /// [`park`]: Monitor::park
    pub(crate) fn notify(&self) {
        atomic::fence(Ordering::SeqCst);

        if self.waiters.load(Ordering::Relaxed) != 0 {
            // Taking the lock keeps the wakeup from slipping between a
            // registered waiter's last condition check and its sleep.
            let _guard = self.lock.lock();
            self.cv.notify_all();
        }
    }

    /// Parks the calling thread until `ready` holds, a notification arrives,
    /// or `until` passes.
    pub(crate) fn park(&self, until: Option<Instant>, ready: impl Fn() -> bool) {
        let mut guard = self.lock.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);

        loop {
            // Re-check only after registering; see `notify`.
            atomic::fence(Ordering::SeqCst);

            if ready() {
                break;
            }

            match until {
                Some(deadline) => {
                    if Instant::now() >= deadline
                        || self.cv.wait_until(&mut guard, deadline).timed_out()
                    {
                        break;
                    }
                }

                None => self.cv.wait(&mut guard),
            }
        }

        self.waiters.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Drives one blocked call: polls `ready`, the token, and the deadline every
/// iteration, escalating from spinning to the configured strategy.
pub(crate) fn wait_until(
    strategy: WaitStrategy,
    monitor: &Monitor,
    deadline: Option<Instant>,
    token: Option<&CancelToken>,
    ready: impl Fn() -> bool,
) -> WaitOutcome {
    let backoff = Backoff::new();

    loop {
        if ready() {
            return WaitOutcome::Ready;
        }

        if token.map_or(false, CancelToken::is_cancelled) {
            return WaitOutcome::Cancelled;
        }

        if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            return WaitOutcome::TimedOut;
        }

        match strategy {
            WaitStrategy::Spin => backoff.spin(),

            WaitStrategy::Yield => backoff.snooze(),

            WaitStrategy::Park if backoff.is_completed() => {
                // A supplied token must stay pollable, so cap each nap.
                let slice = token.map(|_| Instant::now() + POLL_SLICE);
                let until = match (deadline, slice) {
                    (Some(deadline), Some(slice)) => Some(deadline.min(slice)),
                    (deadline, slice) => deadline.or(slice),
                };

                monitor.park(until, &ready);
            }

            WaitStrategy::Park => backoff.snooze(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn notify_without_waiters_returns_immediately() {
        Monitor::new().notify();
    }

    #[test]
    fn park_returns_once_ready() {
        let monitor = Monitor::new();
        monitor.park(None, || true);
        assert_eq!(monitor.waiters.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn park_wakes_on_notification() {
        let monitor = Arc::new(Monitor::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let monitor = monitor.clone();
            let flag = flag.clone();
            thread::spawn(move || monitor.park(None, || flag.load(Ordering::SeqCst)))
        };

        thread::sleep(Duration::from_millis(10));
        flag.store(true, Ordering::SeqCst);
        monitor.notify();

        waiter.join().unwrap();
    }

    #[test]
    fn park_honors_the_deadline() {
        let monitor = Monitor::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        monitor.park(Some(deadline), || false);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn wait_until_reports_readiness() {
        for strategy in [WaitStrategy::Spin, WaitStrategy::Yield, WaitStrategy::Park] {
            let outcome = wait_until(strategy, &Monitor::new(), None, None, || true);
            assert_eq!(outcome, WaitOutcome::Ready);
        }
    }

    #[test]
    fn wait_until_reports_timeout() {
        for strategy in [WaitStrategy::Spin, WaitStrategy::Yield, WaitStrategy::Park] {
            let deadline = Instant::now() + Duration::from_millis(10);
            let outcome = wait_until(strategy, &Monitor::new(), Some(deadline), None, || false);
            assert_eq!(outcome, WaitOutcome::TimedOut);
        }
    }

    #[test]
    fn wait_until_reports_cancellation() {
        for strategy in [WaitStrategy::Spin, WaitStrategy::Yield, WaitStrategy::Park] {
            let token = CancelToken::new();
            token.cancel();

            let outcome = wait_until(strategy, &Monitor::new(), None, Some(&token), || false);
            assert_eq!(outcome, WaitOutcome::Cancelled);
        }
    }

    #[test]
    fn a_parked_wait_still_observes_cancellation() {
        let token = CancelToken::new();
        let monitor = Arc::new(Monitor::new());

        let waiter = {
            let token = token.clone();
            let monitor = monitor.clone();
            thread::spawn(move || {
                wait_until(WaitStrategy::Park, &monitor, None, Some(&token), || false)
            })
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(waiter.join().unwrap(), WaitOutcome::Cancelled);
    }
}
