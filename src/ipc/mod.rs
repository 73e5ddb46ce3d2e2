/*!
 * IPC Primitives
 *
 * Message pipes, data pipes and shared buffers, all reached by handle
 * through `IpcManager`.
 */

pub mod data_pipe;
pub mod global;
pub mod guard;
pub mod manager;
pub mod message_pipe;
pub mod shared_buffer;
pub mod stats;

pub use data_pipe::{DataPipeGeometry, ReadData};
pub use global::{global, init, is_initialized, shutdown};
pub use guard::ScopedHandle;
pub use manager::IpcManager;
pub use message_pipe::{Message, ReadBounds};
pub use shared_buffer::{BufferAccess, BufferInfo, Mapping};
pub use stats::IpcStats;
