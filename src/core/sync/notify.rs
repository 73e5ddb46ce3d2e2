/*!
 * Task-Suspending Waiter
 *
 * Async counterpart of `CondvarWaiter` for callers running on tokio.
 * `Notify` stores a permit when nobody is parked yet, so a wake-up that
 * lands between registration and the first poll is not lost.
 */

use super::condvar::Wakeup;
use super::traits::{Awakable, WakeReason};
use crate::core::types::WaitContext;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Waiter that suspends the calling task instead of the thread
pub struct NotifyWaiter {
    latched: Mutex<Option<Wakeup>>,
    notify: Notify,
}

impl NotifyWaiter {
    pub fn new() -> Self {
        Self {
            latched: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Suspend until awoken or `timeout` elapses
    ///
    /// `None` waits forever. Returns `None` on timeout.
    pub async fn wait(&self, timeout: Option<Duration>) -> Option<Wakeup> {
        let woken = async {
            loop {
                if let Some(wakeup) = *self.latched.lock() {
                    return wakeup;
                }
                self.notify.notified().await;
            }
        };

        match timeout {
            None => Some(woken.await),
            Some(timeout) => match tokio::time::timeout(timeout, woken).await {
                Ok(wakeup) => Some(wakeup),
                Err(_) => *self.latched.lock(),
            },
        }
    }

    /// Wake-up latched so far, without suspending
    pub fn try_take(&self) -> Option<Wakeup> {
        *self.latched.lock()
    }
}

impl Default for NotifyWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Awakable for NotifyWaiter {
    fn awake(&self, context: WaitContext, reason: WakeReason) -> bool {
        let mut latched = self.latched.lock();
        if latched.is_some() {
            return false;
        }
        *latched = Some((context, reason));
        drop(latched);
        self.notify.notify_one();
        true
    }
}
