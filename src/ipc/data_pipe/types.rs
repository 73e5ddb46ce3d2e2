/*!
 * Data Pipe Types
 */

use crate::abi::{CreateDataPipeOptions, CreateDataPipeFlags};
use crate::core::errors::{IpcError, IpcResult};
use crate::core::IpcConfig;
use serde::{Deserialize, Serialize};

/// Outcome of a consumer read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ReadData {
    /// Bytes copied out (consumed, or left in place for `PEEK`)
    Data(Vec<u8>),
    /// Bytes dropped by `DISCARD`
    Discarded(u32),
    /// Bytes currently buffered, reported by `QUERY`
    Queried(u32),
}

impl ReadData {
    /// Byte count the call reports back
    pub fn num_bytes(&self) -> u32 {
        match self {
            ReadData::Data(bytes) => bytes.len() as u32,
            ReadData::Discarded(n) | ReadData::Queried(n) => *n,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ReadData::Data(bytes) => bytes,
            _ => Vec::new(),
        }
    }
}

/// Checked data pipe geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPipeGeometry {
    pub element_num_bytes: usize,
    pub capacity_num_bytes: usize,
    pub may_discard: bool,
}

impl DataPipeGeometry {
    /// Validate creation options against the engine limits
    ///
    /// `None` means one-byte elements and the configured default capacity.
    pub fn from_options(options: Option<&CreateDataPipeOptions>, config: &IpcConfig) -> IpcResult<Self> {
        let Some(options) = options else {
            return Ok(Self {
                element_num_bytes: 1,
                capacity_num_bytes: config.default_data_pipe_capacity as usize,
                may_discard: false,
            });
        };

        if options.element_num_bytes == 0 {
            return Err(IpcError::InvalidArgument(
                "element size must be non-zero".to_string(),
            ));
        }
        if options.capacity_num_bytes == 0 {
            return Err(IpcError::InvalidArgument(
                "capacity must be non-zero".to_string(),
            ));
        }
        if options.capacity_num_bytes % options.element_num_bytes != 0 {
            return Err(IpcError::InvalidArgument(format!(
                "capacity {} is not a multiple of element size {}",
                options.capacity_num_bytes, options.element_num_bytes
            )));
        }
        if options.capacity_num_bytes > config.max_data_pipe_capacity {
            return Err(IpcError::ResourceExhausted(format!(
                "capacity {} exceeds the {} byte limit",
                options.capacity_num_bytes, config.max_data_pipe_capacity
            )));
        }

        Ok(Self {
            element_num_bytes: options.element_num_bytes as usize,
            capacity_num_bytes: options.capacity_num_bytes as usize,
            may_discard: options.flags.contains(CreateDataPipeFlags::MAY_DISCARD),
        })
    }

    #[inline]
    pub fn is_whole_elements(&self, num_bytes: usize) -> bool {
        num_bytes % self.element_num_bytes == 0
    }

    #[inline]
    pub fn round_down(&self, num_bytes: usize) -> usize {
        num_bytes - num_bytes % self.element_num_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_defaults() {
        let config = IpcConfig::default();
        let geometry = DataPipeGeometry::from_options(None, &config).unwrap();
        assert_eq!(geometry.element_num_bytes, 1);
        assert_eq!(
            geometry.capacity_num_bytes,
            config.default_data_pipe_capacity as usize
        );
        assert!(!geometry.may_discard);
    }

    #[test]
    fn test_geometry_rejections() {
        let config = IpcConfig::restricted();
        let bad = [
            CreateDataPipeOptions::new(CreateDataPipeFlags::empty(), 0, 16),
            CreateDataPipeOptions::new(CreateDataPipeFlags::empty(), 4, 0),
            CreateDataPipeOptions::new(CreateDataPipeFlags::empty(), 4, 10),
        ];
        for options in bad {
            assert!(matches!(
                DataPipeGeometry::from_options(Some(&options), &config),
                Err(IpcError::InvalidArgument(_))
            ));
        }

        let huge = CreateDataPipeOptions::new(
            CreateDataPipeFlags::empty(),
            1,
            config.max_data_pipe_capacity + 1,
        );
        assert!(matches!(
            DataPipeGeometry::from_options(Some(&huge), &config),
            Err(IpcError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_read_data_counts() {
        assert_eq!(ReadData::Data(vec![1, 2, 3]).num_bytes(), 3);
        assert_eq!(ReadData::Discarded(8).num_bytes(), 8);
        assert!(ReadData::Queried(4).into_bytes().is_empty());
    }
}
