/*!
 * Signal Cell
 *
 * Per-endpoint readiness state plus the waiters parked on it. The state is
 * one atomic word, so `get` never observes a satisfied bit without its
 * satisfiable bit. Owners call `update` while holding their own state lock.
 */

use crate::abi::{HandleSignals, HandleSignalsState};
use crate::core::errors::IpcError;
use crate::core::sync::{Awakable, WakeReason, WakeResult};
use crate::core::types::WaitContext;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one registration on one cell
pub type WaiterToken = u64;

struct Registration {
    token: WaiterToken,
    waiter: Arc<dyn Awakable>,
    signals: HandleSignals,
    context: WaitContext,
}

struct WaiterList {
    entries: Vec<Registration>,
    next_token: WaiterToken,
    /// Set once the owning handle is closed; later registrations are refused
    cancelled: bool,
}

/// Registration refused because the outcome is already known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotRegistered {
    /// `AlreadyExists` (satisfied), `FailedPrecondition` (unsatisfiable)
    /// or `Cancelled` (handle closed)
    pub error: IpcError,
    /// State observed at registration time
    pub state: HandleSignalsState,
}

pub struct SignalCell {
    state: AtomicU64,
    waiters: Mutex<WaiterList>,
}

impl SignalCell {
    pub fn new(initial: HandleSignalsState) -> Self {
        Self {
            state: AtomicU64::new(initial.to_word()),
            waiters: Mutex::new(WaiterList {
                entries: Vec::new(),
                next_token: 1,
                cancelled: false,
            }),
        }
    }

    #[inline]
    pub fn get(&self) -> HandleSignalsState {
        HandleSignalsState::from_word(self.state.load(Ordering::Acquire))
    }

    /// Publish a new state and wake every waiter whose outcome it decides
    pub fn update(&self, state: HandleSignalsState) -> WakeResult {
        debug_assert!(
            state.satisfiable.contains(state.satisfied),
            "satisfied {:?} not within satisfiable {:?}",
            state.satisfied,
            state.satisfiable
        );
        let state = HandleSignalsState {
            satisfied: state.satisfied & state.satisfiable,
            satisfiable: state.satisfiable,
        };

        let mut list = self.waiters.lock();
        let previous = self.state.swap(state.to_word(), Ordering::AcqRel);
        if previous == state.to_word() || list.entries.is_empty() {
            return WakeResult::NoWaiters;
        }

        let mut woken = 0;
        list.entries.retain(|reg| {
            let reason = if state.satisfies(reg.signals) {
                WakeReason::Satisfied
            } else if !state.can_satisfy(reg.signals) {
                WakeReason::Unsatisfiable
            } else {
                return true;
            };
            reg.waiter.awake(reg.context, reason);
            woken += 1;
            false
        });
        WakeResult::from_count(woken)
    }

    /// Park `waiter` until `signals` becomes satisfied or unsatisfiable
    ///
    /// Refuses when the outcome is already decided; the caller gets the
    /// state with the refusal and does not need a second read.
    pub fn add_waiter(
        &self,
        waiter: Arc<dyn Awakable>,
        signals: HandleSignals,
        context: WaitContext,
    ) -> Result<WaiterToken, NotRegistered> {
        let mut list = self.waiters.lock();
        let state = self.get();

        if list.cancelled {
            return Err(NotRegistered {
                error: IpcError::Cancelled("handle closed".to_string()),
                state,
            });
        }
        if state.satisfies(signals) {
            return Err(NotRegistered {
                error: IpcError::AlreadyExists(format!("{:?} already satisfied", signals)),
                state,
            });
        }
        if !state.can_satisfy(signals) {
            return Err(NotRegistered {
                error: IpcError::FailedPrecondition(format!(
                    "{:?} can never be satisfied",
                    signals
                )),
                state,
            });
        }

        let token = list.next_token;
        list.next_token += 1;
        list.entries.push(Registration {
            token,
            waiter,
            signals,
            context,
        });
        Ok(token)
    }

    /// Drop a registration; unknown tokens are ignored
    pub fn remove_waiter(&self, token: WaiterToken) {
        self.waiters.lock().entries.retain(|reg| reg.token != token);
    }

    /// Wake every waiter with `Cancelled` and refuse new ones
    pub fn cancel_all(&self) -> WakeResult {
        let mut list = self.waiters.lock();
        list.cancelled = true;
        let count = list.entries.len();
        for reg in list.entries.drain(..) {
            reg.waiter.awake(reg.context, WakeReason::Cancelled);
        }
        WakeResult::from_count(count)
    }

    /// Wake every waiter with `Cancelled` but keep accepting new ones
    ///
    /// Used when the handle moves to another owner: waits made through the
    /// old handle end, while the new owner can still wait on the endpoint.
    pub fn cancel_waiters(&self) -> WakeResult {
        let mut list = self.waiters.lock();
        let count = list.entries.len();
        for reg in list.entries.drain(..) {
            reg.waiter.awake(reg.context, WakeReason::Cancelled);
        }
        WakeResult::from_count(count)
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().entries.len()
    }
}

impl fmt::Debug for SignalCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalCell")
            .field("state", &self.get())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::CondvarWaiter;

    fn state(satisfied: HandleSignals, satisfiable: HandleSignals) -> HandleSignalsState {
        HandleSignalsState::new(satisfied, satisfiable)
    }

    fn all() -> HandleSignals {
        HandleSignals::all()
    }

    #[test]
    fn test_register_refuses_decided_outcomes() {
        let cell = SignalCell::new(state(HandleSignals::WRITABLE, all()));
        let waiter = Arc::new(CondvarWaiter::new());

        let err = cell
            .add_waiter(waiter.clone(), HandleSignals::WRITABLE, 0)
            .unwrap_err();
        assert!(matches!(err.error, IpcError::AlreadyExists(_)));
        assert_eq!(err.state, cell.get());

        cell.update(state(HandleSignals::empty(), HandleSignals::PEER_CLOSED));
        let err = cell
            .add_waiter(waiter, HandleSignals::READABLE, 0)
            .unwrap_err();
        assert!(matches!(err.error, IpcError::FailedPrecondition(_)));
    }

    #[test]
    fn test_update_wakes_satisfied_and_unsatisfiable() {
        let cell = SignalCell::new(state(HandleSignals::empty(), all()));
        let readable = Arc::new(CondvarWaiter::new());
        let writable = Arc::new(CondvarWaiter::new());
        cell.add_waiter(readable.clone(), HandleSignals::READABLE, 1)
            .unwrap();
        cell.add_waiter(writable.clone(), HandleSignals::WRITABLE, 2)
            .unwrap();

        let result = cell.update(state(
            HandleSignals::READABLE | HandleSignals::PEER_CLOSED,
            HandleSignals::READABLE | HandleSignals::PEER_CLOSED,
        ));

        assert_eq!(result.count(), 2);
        assert_eq!(readable.try_take(), Some((1, WakeReason::Satisfied)));
        assert_eq!(writable.try_take(), Some((2, WakeReason::Unsatisfiable)));
        assert_eq!(cell.waiter_count(), 0);
    }

    #[test]
    fn test_undecided_waiters_stay_parked() {
        let cell = SignalCell::new(state(HandleSignals::empty(), all()));
        let waiter = Arc::new(CondvarWaiter::new());
        let token = cell
            .add_waiter(waiter.clone(), HandleSignals::READABLE, 0)
            .unwrap();

        cell.update(state(HandleSignals::WRITABLE, all()));
        assert_eq!(waiter.try_take(), None);
        assert_eq!(cell.waiter_count(), 1);

        cell.remove_waiter(token);
        assert_eq!(cell.waiter_count(), 0);
    }

    #[test]
    fn test_cancel_waiters_keeps_accepting() {
        let cell = SignalCell::new(state(HandleSignals::empty(), all()));
        let first = Arc::new(CondvarWaiter::new());
        cell.add_waiter(first.clone(), HandleSignals::READABLE, 3)
            .unwrap();

        assert_eq!(cell.cancel_waiters().count(), 1);
        assert_eq!(first.try_take(), Some((3, WakeReason::Cancelled)));
        assert_eq!(cell.waiter_count(), 0);

        let second = Arc::new(CondvarWaiter::new());
        assert!(cell
            .add_waiter(second, HandleSignals::READABLE, 0)
            .is_ok());
    }

    #[test]
    fn test_cancel_all_refuses_later_registrations() {
        let cell = SignalCell::new(state(HandleSignals::empty(), all()));
        let waiter = Arc::new(CondvarWaiter::new());
        cell.add_waiter(waiter.clone(), HandleSignals::READABLE, 5)
            .unwrap();

        assert!(cell.cancel_all().is_woken());
        assert_eq!(waiter.try_take(), Some((5, WakeReason::Cancelled)));

        let err = cell
            .add_waiter(Arc::new(CondvarWaiter::new()), HandleSignals::READABLE, 0)
            .unwrap_err();
        assert!(matches!(err.error, IpcError::Cancelled(_)));
    }
}
