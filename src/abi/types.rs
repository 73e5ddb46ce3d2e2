/*!
 * Boundary Scalars
 * Handle values, deadlines and time ticks exactly as the native runtime defines them
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Opaque handle value; 0 is reserved for "no handle"
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u32);

impl Handle {
    pub const INVALID: Handle = Handle(0);

    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Relative wait bound in microseconds; all-ones means "never time out"
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(u64);

impl Deadline {
    pub const INDEFINITE: Deadline = Deadline(u64::MAX);

    /// Zero deadline: check the current state and return
    pub const POLL: Deadline = Deadline(0);

    #[inline(always)]
    pub const fn from_micros(micros: u64) -> Self {
        Deadline(micros)
    }

    /// Saturates just below `INDEFINITE` so a finite duration stays finite
    pub fn from_duration(duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX - 1);
        Deadline(micros.min(u64::MAX - 1))
    }

    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub const fn is_indefinite(self) -> bool {
        self.0 == u64::MAX
    }

    /// Timeout to hand to a waiter; `None` for indefinite
    pub fn to_timeout(self) -> Option<Duration> {
        if self.is_indefinite() {
            None
        } else {
            Some(Duration::from_micros(self.0))
        }
    }
}

impl From<Duration> for Deadline {
    fn from(duration: Duration) -> Self {
        Deadline::from_duration(duration)
    }
}

/// Microseconds on a process-local monotonic clock
pub type TimeTicks = i64;

static CLOCK_ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Current monotonic time in microseconds
///
/// The origin is fixed the first time this is called, so values are only
/// comparable within one process.
pub fn time_ticks_now() -> TimeTicks {
    let origin = CLOCK_ORIGIN.get_or_init(Instant::now);
    i64::try_from(origin.elapsed().as_micros()).unwrap_or(i64::MAX)
}
