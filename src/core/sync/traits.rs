/*!
 * Synchronization Traits
 *
 * Core abstraction for anything that can be woken by a signal change.
 */

use crate::core::types::WaitContext;

/// Why a registered waiter was woken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The watched signals intersect the satisfied set
    Satisfied,
    /// The watched signals can never be satisfied any more
    Unsatisfiable,
    /// The watched handle was closed
    Cancelled,
}

/// Result of a wake operation
///
/// Compact representation (single usize) for efficient returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were eligible
    NoWaiters,
}

impl WakeResult {
    #[inline(always)]
    pub fn from_count(n: usize) -> Self {
        if n == 0 {
            WakeResult::NoWaiters
        } else {
            WakeResult::Woken(n)
        }
    }

    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// Something parked on one or more signal cells
///
/// Implementations must be:
/// - **Thread-safe**: woken from whichever thread mutates the endpoint
/// - **Non-blocking**: `awake` runs under the signal cell lock
///
/// Only the first `awake` call is meaningful; later ones are ignored.
pub trait Awakable: Send + Sync {
    /// Deliver a wake-up for the registration tagged with `context`
    ///
    /// Returns `true` if this call completed the waiter.
    fn awake(&self, context: WaitContext, reason: WakeReason) -> bool;
}
