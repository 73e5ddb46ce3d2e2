/*!
 * Handles
 *
 * Handle values, the table that owns them and the dispatchers they resolve to.
 */

pub mod dispatcher;
pub mod table;

pub use dispatcher::{Dispatcher, DispatcherKind};
pub use table::HandleTable;
