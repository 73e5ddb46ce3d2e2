/*!
 * IPC Kernel Library
 * Handle-based message pipes, data pipes, shared buffers and waits
 */

pub mod abi;
pub mod core;
pub mod handle;
pub mod ipc;
pub mod monitoring;
pub mod signals;
pub mod wait;

// Re-exports
pub use abi::*;
pub use crate::core::{IpcConfig, IpcError, IpcResult, ResultCode};
pub use handle::{Dispatcher, DispatcherKind, HandleTable};
pub use ipc::{
    BufferAccess, BufferInfo, IpcManager, IpcStats, Mapping, Message, ReadBounds, ReadData,
    ScopedHandle,
};
pub use monitoring::init_tracing;
pub use wait::{WaitError, WaitReady, WaitResult};
