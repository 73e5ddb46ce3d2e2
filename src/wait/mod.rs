/*!
 * Wait Subsystem
 *
 * Blocks a thread (or suspends a tokio task) until watched handles reach a
 * requested signal state, a deadline passes, or a watched handle is closed.
 */

mod types;
#[allow(clippy::module_inception)]
mod wait;

pub use types::{WaitError, WaitReady, WaitResult};
pub use wait::{wait_many, wait_many_async, wait_one, wait_one_async};
