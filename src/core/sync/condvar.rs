/*!
 * Condvar-Based Waiter
 *
 * Blocking waiter built on parking_lot::Condvar. One waiter serves one
 * wait call, however many signal cells it is registered on; the first
 * wake-up wins and is latched until the caller collects it.
 */

use super::traits::{Awakable, WakeReason};
use crate::core::types::WaitContext;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A latched wake-up: which registration fired and why
pub type Wakeup = (WaitContext, WakeReason);

/// Thread-blocking waiter
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing
pub struct CondvarWaiter {
    mutex: Mutex<Option<Wakeup>>,
    condvar: Condvar,
}

impl CondvarWaiter {
    pub const fn new() -> Self {
        Self {
            mutex: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    /// Block until awoken or `timeout` elapses
    ///
    /// `None` waits forever. Returns `None` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Wakeup> {
        // Far-future deadlines are treated as indefinite
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut guard = self.mutex.lock();

        loop {
            if let Some(wakeup) = *guard {
                return Some(wakeup);
            }
            match (timeout, deadline) {
                (None, _) | (Some(_), None) => {
                    self.condvar.wait(&mut guard);
                }
                (Some(_), Some(deadline)) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        // A wake-up can land right at the deadline
                        return *guard;
                    }
                }
            }
        }
    }

    /// Wake-up latched so far, without blocking
    pub fn try_take(&self) -> Option<Wakeup> {
        *self.mutex.lock()
    }
}

impl Default for CondvarWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Awakable for CondvarWaiter {
    fn awake(&self, context: WaitContext, reason: WakeReason) -> bool {
        let mut guard = self.mutex.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some((context, reason));
        self.condvar.notify_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_condvar_wake_one() {
        let waiter = Arc::new(CondvarWaiter::new());
        let waiter_clone = waiter.clone();

        let handle = thread::spawn(move || waiter_clone.wait(Some(Duration::from_secs(5))));

        // Give thread time to wait
        thread::sleep(Duration::from_millis(50));

        assert!(waiter.awake(7, WakeReason::Satisfied));
        assert_eq!(handle.join().unwrap(), Some((7, WakeReason::Satisfied)));
    }

    #[test]
    fn test_condvar_timeout() {
        let waiter = CondvarWaiter::new();
        let start = Instant::now();
        let result = waiter.wait(Some(Duration::from_millis(50)));

        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_first_wake_wins() {
        let waiter = CondvarWaiter::new();
        assert!(waiter.awake(1, WakeReason::Cancelled));
        assert!(!waiter.awake(2, WakeReason::Satisfied));
        assert_eq!(waiter.wait(None), Some((1, WakeReason::Cancelled)));
    }

    #[test]
    fn test_latched_before_wait_returns_immediately() {
        let waiter = CondvarWaiter::new();
        waiter.awake(3, WakeReason::Unsatisfiable);
        let start = Instant::now();
        assert_eq!(
            waiter.wait(Some(Duration::from_secs(10))),
            Some((3, WakeReason::Unsatisfiable))
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let waiter = Arc::new(CondvarWaiter::new());
        let waiter_clone = waiter.clone();
        let handle = thread::spawn(move || waiter_clone.wait(Some(Duration::MAX)));
        thread::sleep(Duration::from_millis(20));
        waiter.awake(0, WakeReason::Satisfied);
        assert!(handle.join().unwrap().is_some());
    }
}
