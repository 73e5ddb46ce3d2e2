/*!
 * Shared Buffer Types
 */

use serde::{Deserialize, Serialize};

/// Access carried by a buffer handle and every mapping made through it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferAccess {
    ReadWrite,
    ReadOnly,
}

impl BufferAccess {
    pub fn can_write(&self) -> bool {
        matches!(self, BufferAccess::ReadWrite)
    }

    /// Narrow to read-only when asked; never widens
    pub fn restrict(self, read_only: bool) -> Self {
        if read_only {
            BufferAccess::ReadOnly
        } else {
            self
        }
    }
}

/// Description of the region behind a buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    pub size: u64,
    pub access: BufferAccess,
}
