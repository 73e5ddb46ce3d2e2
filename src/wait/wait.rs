/*!
 * Wait Implementation
 *
 * One waiter is registered on every watched handle; the first registration
 * to fire (or the deadline) decides the outcome. Outcomes already decided at
 * registration time return without blocking, whatever the deadline.
 */

use super::types::{WaitError, WaitReady, WaitResult};
use crate::abi::{Deadline, Handle, HandleSignals, HandleSignalsState};
use crate::core::errors::IpcError;
use crate::core::sync::{Awakable, CondvarWaiter, NotifyWaiter, WakeReason, Wakeup};
use crate::handle::{Dispatcher, HandleTable};
use crate::signals::{NotRegistered, WaiterToken};
use std::sync::Arc;
use tracing::{instrument, trace};

/// Handles resolved and registered, waiting for a wake-up
struct Armed {
    dispatchers: Vec<Arc<Dispatcher>>,
    tokens: Vec<WaiterToken>,
}

fn states_of(dispatchers: &[Arc<Dispatcher>]) -> Vec<HandleSignalsState> {
    dispatchers.iter().map(|d| d.signals_state()).collect()
}

/// Best-effort states for every handle, for error reports
fn states_from_table(table: &HandleTable, handles: &[Handle]) -> Vec<HandleSignalsState> {
    handles
        .iter()
        .map(|&handle| {
            table
                .get(handle)
                .map(|d| d.signals_state())
                .unwrap_or_else(|_| HandleSignalsState::never())
        })
        .collect()
}

fn resolve_all(
    table: &HandleTable,
    handles: &[Handle],
    signals: &[HandleSignals],
) -> Result<Vec<Arc<Dispatcher>>, WaitError> {
    if handles.is_empty() {
        return Err(WaitError::new(
            IpcError::InvalidArgument("no handles to wait on".to_string()),
            None,
            Vec::new(),
        ));
    }
    if handles.len() != signals.len() {
        return Err(WaitError::new(
            IpcError::InvalidArgument(format!(
                "{} handles but {} signal masks",
                handles.len(),
                signals.len()
            )),
            None,
            states_from_table(table, handles),
        ));
    }

    let mut dispatchers = Vec::with_capacity(handles.len());
    for (index, &handle) in handles.iter().enumerate() {
        match table.get(handle) {
            Ok(dispatcher) => dispatchers.push(dispatcher),
            Err(error) => {
                return Err(WaitError::new(
                    error,
                    Some(index),
                    states_from_table(table, handles),
                ))
            }
        }
    }
    Ok(dispatchers)
}

/// Register `waiter` on every dispatcher, or settle immediately
fn arm(
    dispatchers: Vec<Arc<Dispatcher>>,
    signals: &[HandleSignals],
    waiter: Arc<dyn Awakable>,
) -> Result<Armed, WaitResult> {
    let mut tokens = Vec::with_capacity(dispatchers.len());
    for (index, dispatcher) in dispatchers.iter().enumerate() {
        match dispatcher.add_waiter(waiter.clone(), signals[index], index as u64) {
            Ok(token) => tokens.push(token),
            Err(NotRegistered { error, .. }) => {
                for (dispatcher, token) in dispatchers.iter().zip(tokens) {
                    dispatcher.remove_waiter(token);
                }
                let states = states_of(&dispatchers);
                return Err(match error {
                    IpcError::AlreadyExists(_) => Ok(WaitReady { index, states }),
                    error => Err(WaitError::new(error, Some(index), states)),
                });
            }
        }
    }
    Ok(Armed {
        dispatchers,
        tokens,
    })
}

/// A watched handle that no longer names the dispatcher we armed on
///
/// Covers a transfer or close that raced with registration: the move
/// cancels waiters already parked, and this catches the ones parked after.
fn moved_away(table: &HandleTable, handles: &[Handle], armed: &Armed) -> Option<Wakeup> {
    handles
        .iter()
        .zip(&armed.dispatchers)
        .position(|(&handle, dispatcher)| !table.holds(handle, dispatcher))
        .map(|index| (index as u64, WakeReason::Cancelled))
}

fn settle(armed: Armed, wakeup: Option<Wakeup>) -> WaitResult {
    for (dispatcher, token) in armed.dispatchers.iter().zip(armed.tokens) {
        dispatcher.remove_waiter(token);
    }
    let states = states_of(&armed.dispatchers);

    let Some((context, reason)) = wakeup else {
        return Err(WaitError::new(
            IpcError::DeadlineExceeded("no handle became ready in time".to_string()),
            None,
            states,
        ));
    };
    let index = context as usize;
    match reason {
        WakeReason::Satisfied => Ok(WaitReady { index, states }),
        WakeReason::Unsatisfiable => Err(WaitError::new(
            IpcError::FailedPrecondition("signals can no longer be satisfied".to_string()),
            Some(index),
            states,
        )),
        WakeReason::Cancelled => Err(WaitError::new(
            IpcError::Cancelled("handle closed during wait".to_string()),
            Some(index),
            states,
        )),
    }
}

fn log_outcome(result: &WaitResult) {
    match result {
        Ok(ready) => trace!(index = ready.index, "Wait satisfied"),
        Err(err) => trace!(index = ?err.index, code = ?err.code(), "Wait failed"),
    }
}

/// Block until one of `handles` satisfies its mask, fails, or the deadline passes
#[instrument(level = "trace", skip_all, fields(count = handles.len(), deadline = deadline.raw()))]
pub fn wait_many(
    table: &HandleTable,
    handles: &[Handle],
    signals: &[HandleSignals],
    deadline: Deadline,
) -> WaitResult {
    let dispatchers = resolve_all(table, handles, signals)?;
    let waiter = Arc::new(CondvarWaiter::new());
    let armed = match arm(dispatchers, signals, waiter.clone()) {
        Ok(armed) => armed,
        Err(decided) => return decided,
    };

    let wakeup = if let Some(moved) = moved_away(table, handles, &armed) {
        waiter.try_take().or(Some(moved))
    } else if deadline == Deadline::POLL {
        waiter.try_take()
    } else {
        waiter.wait(deadline.to_timeout())
    };
    let result = settle(armed, wakeup);
    log_outcome(&result);
    result
}

/// Single-handle form of [`wait_many`], returning the handle's state
pub fn wait_one(
    table: &HandleTable,
    handle: Handle,
    signals: HandleSignals,
    deadline: Deadline,
) -> Result<HandleSignalsState, WaitError> {
    wait_many(table, &[handle], &[signals], deadline).map(first_state)
}

/// Task-suspending form of [`wait_many`]
pub async fn wait_many_async(
    table: &HandleTable,
    handles: &[Handle],
    signals: &[HandleSignals],
    deadline: Deadline,
) -> WaitResult {
    let dispatchers = resolve_all(table, handles, signals)?;
    let waiter = Arc::new(NotifyWaiter::new());
    let armed = match arm(dispatchers, signals, waiter.clone()) {
        Ok(armed) => armed,
        Err(decided) => return decided,
    };

    let wakeup = if let Some(moved) = moved_away(table, handles, &armed) {
        waiter.try_take().or(Some(moved))
    } else if deadline == Deadline::POLL {
        waiter.try_take()
    } else {
        waiter.wait(deadline.to_timeout()).await
    };
    let result = settle(armed, wakeup);
    log_outcome(&result);
    result
}

/// Task-suspending form of [`wait_one`]
pub async fn wait_one_async(
    table: &HandleTable,
    handle: Handle,
    signals: HandleSignals,
    deadline: Deadline,
) -> Result<HandleSignalsState, WaitError> {
    wait_many_async(table, &[handle], &[signals], deadline)
        .await
        .map(first_state)
}

fn first_state(ready: WaitReady) -> HandleSignalsState {
    ready
        .states
        .first()
        .copied()
        .unwrap_or_else(HandleSignalsState::never)
}
