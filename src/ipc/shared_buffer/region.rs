/*!
 * Shared Regions and Mappings
 *
 * A region lives as long as any handle or mapping holds its `Arc`. Live bytes
 * are counted in an accounting cell owned by the engine instance.
 */

use super::types::{BufferAccess, BufferInfo};
use crate::core::errors::{IpcError, IpcResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub struct SharedRegion {
    bytes: RwLock<Box<[u8]>>,
    size: usize,
    accounting: Arc<AtomicU64>,
}

impl SharedRegion {
    fn allocate(size: usize, accounting: Arc<AtomicU64>) -> IpcResult<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size).map_err(|e| {
            IpcError::ResourceExhausted(format!("cannot allocate {} bytes: {}", size, e))
        })?;
        bytes.resize(size, 0u8);
        accounting.fetch_add(size as u64, Ordering::Relaxed);
        debug!(size, "Shared region allocated");
        Ok(Self {
            bytes: RwLock::new(bytes.into_boxed_slice()),
            size,
            accounting,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.accounting.fetch_sub(self.size as u64, Ordering::Relaxed);
        debug!(size = self.size, "Shared region released");
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("size", &self.size)
            .finish()
    }
}

/// What a shared buffer handle resolves to
#[derive(Debug)]
pub struct SharedBufferHandle {
    region: Arc<SharedRegion>,
    access: BufferAccess,
}

impl SharedBufferHandle {
    /// Allocate a zeroed region and the first handle on it
    pub fn allocate(size: usize, accounting: Arc<AtomicU64>) -> IpcResult<Self> {
        Ok(Self {
            region: Arc::new(SharedRegion::allocate(size, accounting)?),
            access: BufferAccess::ReadWrite,
        })
    }

    /// Another handle on the same region, optionally narrowed to read-only
    pub fn duplicate(&self, read_only: bool) -> Self {
        Self {
            region: self.region.clone(),
            access: self.access.restrict(read_only),
        }
    }

    /// Map `length` bytes starting at `offset`
    pub fn map(&self, offset: u64, length: u64) -> IpcResult<Mapping> {
        if length == 0 {
            return Err(IpcError::InvalidArgument(
                "mapping length must be non-zero".to_string(),
            ));
        }
        let end = offset.checked_add(length).ok_or_else(|| {
            IpcError::OutOfRange(format!("offset {} + length {} overflows", offset, length))
        })?;
        if end > self.region.size as u64 {
            return Err(IpcError::OutOfRange(format!(
                "range {}..{} exceeds buffer of {} bytes",
                offset, end, self.region.size
            )));
        }
        trace!(offset, length, access = ?self.access, "Shared buffer mapped");
        Ok(Mapping {
            region: self.region.clone(),
            offset: offset as usize,
            len: length as usize,
            access: self.access,
        })
    }

    pub fn info(&self) -> BufferInfo {
        BufferInfo {
            size: self.region.size as u64,
            access: self.access,
        }
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    pub fn same_region(&self, other: &SharedBufferHandle) -> bool {
        Arc::ptr_eq(&self.region, &other.region)
    }
}

/// A window onto a shared region
///
/// Keeps the region alive after every handle on it is closed.
#[derive(Debug, Clone)]
pub struct Mapping {
    region: Arc<SharedRegion>,
    offset: usize,
    len: usize,
    access: BufferAccess,
}

impl Mapping {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    fn window(&self, at: usize, count: usize) -> IpcResult<std::ops::Range<usize>> {
        let end = at
            .checked_add(count)
            .filter(|end| *end <= self.len)
            .ok_or_else(|| {
                IpcError::OutOfRange(format!(
                    "{} bytes at {} exceed mapping of {} bytes",
                    count, at, self.len
                ))
            })?;
        Ok(self.offset + at..self.offset + end)
    }

    /// Copy `out.len()` bytes starting at `at` (relative to the mapping)
    pub fn read_at(&self, at: usize, out: &mut [u8]) -> IpcResult<()> {
        let range = self.window(at, out.len())?;
        out.copy_from_slice(&self.region.bytes.read()[range]);
        Ok(())
    }

    pub fn write_at(&self, at: usize, data: &[u8]) -> IpcResult<()> {
        if !self.access.can_write() {
            return Err(IpcError::PermissionDenied(
                "mapping is read-only".to_string(),
            ));
        }
        let range = self.window(at, data.len())?;
        self.region.bytes.write()[range].copy_from_slice(data);
        Ok(())
    }

    /// Snapshot of the whole mapping
    pub fn to_vec(&self) -> Vec<u8> {
        self.region.bytes.read()[self.offset..self.offset + self.len].to_vec()
    }

    pub fn fill(&self, value: u8) -> IpcResult<()> {
        if !self.access.can_write() {
            return Err(IpcError::PermissionDenied(
                "mapping is read-only".to_string(),
            ));
        }
        self.region.bytes.write()[self.offset..self.offset + self.len].fill(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounting() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    #[test]
    fn test_duplicate_shares_memory() {
        let buffer = SharedBufferHandle::allocate(64, accounting()).unwrap();
        let dup = buffer.duplicate(false);
        assert!(buffer.same_region(&dup));

        buffer.map(0, 64).unwrap().write_at(10, b"shared").unwrap();
        let mut out = [0u8; 6];
        dup.map(10, 6).unwrap().read_at(0, &mut out).unwrap();
        assert_eq!(&out, b"shared");
    }

    #[test]
    fn test_read_only_never_widens() {
        let buffer = SharedBufferHandle::allocate(8, accounting()).unwrap();
        let ro = buffer.duplicate(true);
        let again = ro.duplicate(false);
        assert_eq!(again.access(), BufferAccess::ReadOnly);

        let mapping = again.map(0, 8).unwrap();
        assert!(matches!(
            mapping.write_at(0, b"x"),
            Err(IpcError::PermissionDenied(_))
        ));
        assert!(matches!(mapping.fill(1), Err(IpcError::PermissionDenied(_))));
    }

    #[test]
    fn test_map_bounds() {
        let buffer = SharedBufferHandle::allocate(16, accounting()).unwrap();
        assert!(matches!(buffer.map(0, 0), Err(IpcError::InvalidArgument(_))));
        assert!(matches!(buffer.map(8, 9), Err(IpcError::OutOfRange(_))));
        assert!(matches!(
            buffer.map(u64::MAX, 2),
            Err(IpcError::OutOfRange(_))
        ));

        let mapping = buffer.map(8, 8).unwrap();
        assert!(matches!(
            mapping.write_at(4, &[0; 5]),
            Err(IpcError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_mapping_outlives_handles() {
        let live = accounting();
        let buffer = SharedBufferHandle::allocate(32, live.clone()).unwrap();
        assert_eq!(live.load(Ordering::Relaxed), 32);

        let mapping = buffer.map(0, 32).unwrap();
        drop(buffer);
        mapping.fill(7).unwrap();
        assert_eq!(mapping.to_vec(), vec![7; 32]);
        assert_eq!(live.load(Ordering::Relaxed), 32);

        drop(mapping);
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }
}
