/*!
 * Handle Signals
 * Readiness bits and the {satisfied, satisfiable} pair reported for a handle
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Readiness conditions a handle can be waited on for
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HandleSignals: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const PEER_CLOSED = 1 << 2;
    }
}

impl HandleSignals {
    #[inline(always)]
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    #[inline(always)]
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    #[inline(always)]
    pub const fn is_peer_closed(self) -> bool {
        self.contains(Self::PEER_CLOSED)
    }
}

/// Signal state of one handle
///
/// `satisfied` is always a subset of `satisfiable`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HandleSignalsState {
    /// Signals that hold right now
    pub satisfied: HandleSignals,
    /// Signals that hold now or may hold in the future
    pub satisfiable: HandleSignals,
}

impl HandleSignalsState {
    /// Build a state, dropping any satisfied bit that is not satisfiable
    #[inline]
    pub fn new(satisfied: HandleSignals, satisfiable: HandleSignals) -> Self {
        debug_assert!(
            satisfiable.contains(satisfied),
            "satisfied {:?} not within satisfiable {:?}",
            satisfied,
            satisfiable
        );
        Self {
            satisfied: satisfied & satisfiable,
            satisfiable,
        }
    }

    /// State of an object that never signals anything
    pub const fn never() -> Self {
        Self {
            satisfied: HandleSignals::empty(),
            satisfiable: HandleSignals::empty(),
        }
    }

    #[inline(always)]
    pub fn satisfies(&self, signals: HandleSignals) -> bool {
        self.satisfied.intersects(signals)
    }

    #[inline(always)]
    pub fn can_satisfy(&self, signals: HandleSignals) -> bool {
        self.satisfiable.intersects(signals)
    }

    /// Pack both sets into one word (satisfied low, satisfiable high)
    #[inline(always)]
    pub(crate) fn to_word(self) -> u64 {
        (self.satisfied.bits() as u64) | ((self.satisfiable.bits() as u64) << 32)
    }

    #[inline(always)]
    pub(crate) fn from_word(word: u64) -> Self {
        Self {
            satisfied: HandleSignals::from_bits_retain(word as u32),
            satisfiable: HandleSignals::from_bits_retain((word >> 32) as u32),
        }
    }
}

impl fmt::Debug for HandleSignalsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSignalsState")
            .field("satisfied", &self.satisfied)
            .field("satisfiable", &self.satisfiable)
            .finish()
    }
}
