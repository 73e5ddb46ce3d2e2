/*!
 * Synchronization Primitives
 *
 * Waiters used by the wait subsystem:
 * - `CondvarWaiter` blocks the calling thread
 * - `NotifyWaiter` suspends a tokio task
 *
 * Both implement `Awakable`, the interface signal cells deliver wake-ups through.
 */

mod condvar;
mod notify;
mod traits;

pub use condvar::{CondvarWaiter, Wakeup};
pub use notify::NotifyWaiter;
pub use traits::{Awakable, WakeReason, WakeResult};
