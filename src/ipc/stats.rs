/*!
 * Engine Statistics
 */

use crate::core::errors::{IpcError, IpcResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one engine instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcStats {
    pub live_handles: usize,
    pub message_pipes_created: u64,
    pub data_pipes_created: u64,
    pub shared_buffers_created: u64,
    pub messages_written: u64,
    pub messages_read: u64,
    pub handles_transferred: u64,
    pub data_bytes_written: u64,
    pub data_bytes_read: u64,
    pub shared_bytes_live: u64,
}

impl IpcStats {
    /// Compact binary form for shipping stats between components
    pub fn to_bincode_bytes(&self) -> IpcResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| IpcError::Internal(format!("Failed to serialize stats with bincode: {}", e)))
    }

    pub fn from_bincode_bytes(bytes: &[u8]) -> IpcResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| IpcError::InvalidArgument(format!("Failed to deserialize stats with bincode: {}", e)))
    }
}

/// Live counters behind `IpcStats`
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub message_pipes_created: AtomicU64,
    pub data_pipes_created: AtomicU64,
    pub shared_buffers_created: AtomicU64,
    pub messages_written: AtomicU64,
    pub messages_read: AtomicU64,
    pub handles_transferred: AtomicU64,
    pub data_bytes_written: AtomicU64,
    pub data_bytes_read: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self, live_handles: usize, shared_bytes_live: u64) -> IpcStats {
        IpcStats {
            live_handles,
            message_pipes_created: self.message_pipes_created.load(Ordering::Relaxed),
            data_pipes_created: self.data_pipes_created.load(Ordering::Relaxed),
            shared_buffers_created: self.shared_buffers_created.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            messages_read: self.messages_read.load(Ordering::Relaxed),
            handles_transferred: self.handles_transferred.load(Ordering::Relaxed),
            data_bytes_written: self.data_bytes_written.load(Ordering::Relaxed),
            data_bytes_read: self.data_bytes_read.load(Ordering::Relaxed),
            shared_bytes_live,
        }
    }
}
