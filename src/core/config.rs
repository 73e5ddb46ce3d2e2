/*!
 * Engine Configuration
 *
 * Limits applied by the IPC manager. Defaults come from `core::limits`;
 * values can be overridden from the environment or a JSON document.
 */

use super::errors::{IpcError, IpcResult};
use super::limits::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Limits for one engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct IpcConfig {
    /// Live handles allowed in the table
    pub max_handles: usize,
    /// Largest message payload in bytes
    pub max_message_num_bytes: usize,
    /// Most handles attached to a single message
    pub max_message_num_handles: usize,
    /// Capacity used for data pipes created without options
    pub default_data_pipe_capacity: u32,
    /// Largest accepted data pipe capacity
    pub max_data_pipe_capacity: u32,
    /// Largest shared buffer in bytes
    pub max_shared_buffer_bytes: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_handles: DEFAULT_MAX_HANDLES,
            max_message_num_bytes: DEFAULT_MAX_MESSAGE_NUM_BYTES,
            max_message_num_handles: DEFAULT_MAX_MESSAGE_NUM_HANDLES,
            default_data_pipe_capacity: DEFAULT_DATA_PIPE_CAPACITY,
            max_data_pipe_capacity: MAX_DATA_PIPE_CAPACITY,
            max_shared_buffer_bytes: MAX_SHARED_BUFFER_BYTES,
        }
    }
}

impl IpcConfig {
    /// Small limits for tests and sandboxed embedders
    pub fn restricted() -> Self {
        Self {
            max_handles: 1024,
            max_message_num_bytes: 64 * 1024,
            max_message_num_handles: 64,
            default_data_pipe_capacity: 4 * 1024,
            max_data_pipe_capacity: 1024 * 1024,
            max_shared_buffer_bytes: 16 * 1024 * 1024,
        }
    }

    /// Defaults overridden by environment variables
    ///
    /// Environment variables:
    /// - IPC_MAX_HANDLES
    /// - IPC_MAX_MESSAGE_BYTES
    /// - IPC_MAX_MESSAGE_HANDLES
    /// - IPC_DATA_PIPE_CAPACITY
    /// - IPC_MAX_DATA_PIPE_CAPACITY
    /// - IPC_MAX_SHARED_BUFFER_BYTES
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("IPC_MAX_HANDLES", &mut config.max_handles);
        override_from_env("IPC_MAX_MESSAGE_BYTES", &mut config.max_message_num_bytes);
        override_from_env("IPC_MAX_MESSAGE_HANDLES", &mut config.max_message_num_handles);
        override_from_env("IPC_DATA_PIPE_CAPACITY", &mut config.default_data_pipe_capacity);
        override_from_env(
            "IPC_MAX_DATA_PIPE_CAPACITY",
            &mut config.max_data_pipe_capacity,
        );
        override_from_env(
            "IPC_MAX_SHARED_BUFFER_BYTES",
            &mut config.max_shared_buffer_bytes,
        );
        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> IpcResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> IpcResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject limits the engine cannot honor
    pub fn validate(&self) -> IpcResult<()> {
        if self.max_handles == 0 || self.max_handles > MAX_HANDLE_SLOTS {
            return Err(IpcError::InvalidArgument(format!(
                "max_handles must be in 1..={}, got {}",
                MAX_HANDLE_SLOTS, self.max_handles
            )));
        }
        if self.default_data_pipe_capacity == 0 || self.max_data_pipe_capacity == 0 {
            return Err(IpcError::InvalidArgument(
                "data pipe capacities must be non-zero".to_string(),
            ));
        }
        if self.default_data_pipe_capacity > self.max_data_pipe_capacity {
            return Err(IpcError::InvalidArgument(format!(
                "default data pipe capacity {} exceeds maximum {}",
                self.default_data_pipe_capacity, self.max_data_pipe_capacity
            )));
        }
        if self.max_shared_buffer_bytes == 0 {
            return Err(IpcError::InvalidArgument(
                "max_shared_buffer_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_from_env<T: FromStr>(var: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(var, value = %raw, "Ignoring unparsable configuration override"),
    }
}
