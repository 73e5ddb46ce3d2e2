/*!
 * Signal State Engine
 * Readiness state per endpoint and the waiters notified when it changes
 */

mod cell;

pub use cell::{NotRegistered, SignalCell, WaiterToken};
