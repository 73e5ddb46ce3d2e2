/*!
 * Message Pipe Types
 */

use crate::abi::Handle;
use crate::handle::Dispatcher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A message as handed to the reader
///
/// `handles` are freshly issued in the reader's table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub bytes: Vec<u8>,
    pub handles: Vec<Handle>,
}

impl Message {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            handles: Vec::new(),
        }
    }

    pub fn with_handles(bytes: impl Into<Vec<u8>>, handles: Vec<Handle>) -> Self {
        Self {
            bytes: bytes.into(),
            handles,
        }
    }
}

/// Caller-side limits for a bounded read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBounds {
    pub max_bytes: usize,
    pub max_handles: usize,
}

impl ReadBounds {
    pub const UNBOUNDED: ReadBounds = ReadBounds {
        max_bytes: usize::MAX,
        max_handles: usize::MAX,
    };

    pub fn new(max_bytes: usize, max_handles: usize) -> Self {
        Self {
            max_bytes,
            max_handles,
        }
    }
}

/// A message sitting in an endpoint queue; cargo is held as dispatchers
#[derive(Debug)]
pub(crate) struct QueuedMessage {
    pub bytes: Vec<u8>,
    pub cargo: Vec<Arc<Dispatcher>>,
}

impl QueuedMessage {
    pub fn fits(&self, bounds: ReadBounds) -> bool {
        self.bytes.len() <= bounds.max_bytes && self.cargo.len() <= bounds.max_handles
    }

    /// Close every attached dispatcher; used when the message is destroyed unread
    pub fn close_cargo(self) {
        for dispatcher in self.cargo {
            dispatcher.close();
        }
    }
}
