/*!
 * Handle Table
 *
 * Maps opaque handle values to dispatchers. A value packs the slot index
 * (+1, so 0 is never issued) with the slot generation. Freed slots sit in a
 * FIFO quarantine and come back with a bumped generation, so a stale value
 * does not resolve to a newer object.
 */

use super::dispatcher::Dispatcher;
use crate::abi::Handle;
use crate::core::errors::{IpcError, IpcResult};
use crate::core::limits::{
    HANDLE_GENERATIONS, HANDLE_INDEX_BITS, HANDLE_INDEX_MASK, HANDLE_QUARANTINE_LEN,
    MAX_HANDLE_SLOTS,
};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

struct Entry {
    dispatcher: Arc<Dispatcher>,
    /// Attached to a message that is being written
    busy: bool,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    live: usize,
}

impl Inner {
    fn locate(&self, handle: Handle) -> Option<usize> {
        let raw = handle.raw();
        let index = (raw & HANDLE_INDEX_MASK).checked_sub(1)? as usize;
        let generation = raw >> HANDLE_INDEX_BITS;
        let slot = self.slots.get(index)?;
        (slot.generation == generation && slot.entry.is_some()).then_some(index)
    }

    fn entry(&self, handle: Handle) -> Option<&Entry> {
        self.locate(handle)
            .and_then(|index| self.slots[index].entry.as_ref())
    }

    fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        let index = self.locate(handle)?;
        self.slots[index].entry.as_mut()
    }

    /// Grow while the quarantine is short; otherwise reuse the oldest freed slot
    fn claim_slot(&mut self) -> Option<u32> {
        if self.free.len() >= HANDLE_QUARANTINE_LEN || self.slots.len() >= MAX_HANDLE_SLOTS {
            if let Some(index) = self.free.pop_front() {
                return Some(index);
            }
        }
        if self.slots.len() < MAX_HANDLE_SLOTS {
            self.slots.push(Slot::default());
            return Some((self.slots.len() - 1) as u32);
        }
        self.free.pop_front()
    }

    fn insert(&mut self, dispatcher: Arc<Dispatcher>) -> Option<Handle> {
        let index = self.claim_slot()?;
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(Entry {
            dispatcher,
            busy: false,
        });
        self.live += 1;
        Some(Handle::from_raw(
            (slot.generation << HANDLE_INDEX_BITS) | (index + 1),
        ))
    }

    fn release(&mut self, index: usize) -> Option<Arc<Dispatcher>> {
        let slot = &mut self.slots[index];
        let entry = slot.entry.take()?;
        slot.generation = (slot.generation + 1) % HANDLE_GENERATIONS;
        self.free.push_back(index as u32);
        self.live -= 1;
        Some(entry.dispatcher)
    }
}

/// Process-wide handle registry
///
/// Lookups take the read lock and run concurrently; inserts and removals
/// take the write lock.
pub struct HandleTable {
    inner: RwLock<Inner>,
    max_handles: usize,
}

impl HandleTable {
    pub fn new(max_handles: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_handles: max_handles.min(MAX_HANDLE_SLOTS),
        }
    }

    /// Register a dispatcher under a fresh handle value
    pub fn add(&self, dispatcher: Arc<Dispatcher>) -> IpcResult<Handle> {
        let mut inner = self.inner.write();
        if inner.live >= self.max_handles {
            return Err(IpcError::ResourceExhausted(format!(
                "handle table full ({} live)",
                inner.live
            )));
        }
        let kind = dispatcher.kind();
        let handle = inner.insert(dispatcher).ok_or_else(|| {
            IpcError::ResourceExhausted("no handle slot available".to_string())
        })?;
        trace!(%handle, %kind, "Handle added");
        Ok(handle)
    }

    /// Register several dispatchers at once; all or none are inserted
    pub fn add_many(&self, dispatchers: Vec<Arc<Dispatcher>>) -> IpcResult<Vec<Handle>> {
        if dispatchers.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.write();
        if inner.live + dispatchers.len() > self.max_handles {
            return Err(IpcError::ResourceExhausted(format!(
                "handle table cannot take {} more ({} live)",
                dispatchers.len(),
                inner.live
            )));
        }

        let mut handles = Vec::with_capacity(dispatchers.len());
        for dispatcher in dispatchers {
            match inner.insert(dispatcher) {
                Some(handle) => handles.push(handle),
                None => {
                    for handle in handles {
                        if let Some(index) = inner.locate(handle) {
                            inner.release(index);
                        }
                    }
                    return Err(IpcError::ResourceExhausted(
                        "no handle slot available".to_string(),
                    ));
                }
            }
        }
        Ok(handles)
    }

    /// Dispatcher behind `handle`
    pub fn get(&self, handle: Handle) -> IpcResult<Arc<Dispatcher>> {
        let inner = self.inner.read();
        let entry = inner
            .entry(handle)
            .ok_or_else(|| IpcError::NotFound(format!("handle {}", handle)))?;
        if entry.busy {
            return Err(IpcError::Busy(format!("handle {} is in transit", handle)));
        }
        Ok(entry.dispatcher.clone())
    }

    /// True while `handle` still names `dispatcher`, in transit or not
    pub fn holds(&self, handle: Handle, dispatcher: &Arc<Dispatcher>) -> bool {
        self.inner
            .read()
            .entry(handle)
            .is_some_and(|entry| Arc::ptr_eq(&entry.dispatcher, dispatcher))
    }

    /// Unregister `handle`, handing its dispatcher to the caller to close
    pub fn remove(&self, handle: Handle) -> IpcResult<Arc<Dispatcher>> {
        let mut inner = self.inner.write();
        let index = inner
            .locate(handle)
            .ok_or_else(|| IpcError::InvalidArgument(format!("handle {} is not open", handle)))?;
        if inner.slots[index]
            .entry
            .as_ref()
            .is_some_and(|entry| entry.busy)
        {
            return Err(IpcError::Busy(format!("handle {} is in transit", handle)));
        }
        let dispatcher = inner
            .release(index)
            .ok_or_else(|| IpcError::Internal(format!("slot for {} vanished", handle)))?;
        debug!(%handle, kind = %dispatcher.kind(), "Handle removed");
        Ok(dispatcher)
    }

    /// Mark handles as attached to an outgoing message
    ///
    /// Fails without marking anything if a handle is unknown, listed twice
    /// (`InvalidArgument`) or already in transit (`Busy`).
    pub fn begin_transport(&self, handles: &[Handle]) -> IpcResult<Vec<Arc<Dispatcher>>> {
        let mut inner = self.inner.write();
        let mut seen = HashSet::with_capacity(handles.len());
        let mut dispatchers = Vec::with_capacity(handles.len());

        for &handle in handles {
            if !seen.insert(handle) {
                return Err(IpcError::InvalidArgument(format!(
                    "handle {} attached twice",
                    handle
                )));
            }
            let entry = inner.entry(handle).ok_or_else(|| {
                IpcError::InvalidArgument(format!("attached handle {} is not open", handle))
            })?;
            if entry.busy {
                return Err(IpcError::Busy(format!("handle {} is in transit", handle)));
            }
            dispatchers.push(entry.dispatcher.clone());
        }

        for &handle in handles {
            if let Some(entry) = inner.entry_mut(handle) {
                entry.busy = true;
            }
        }
        Ok(dispatchers)
    }

    /// Finish a transfer started with `begin_transport`
    ///
    /// On commit the handles leave the table; otherwise they become usable again.
    pub fn end_transport(&self, handles: &[Handle], commit: bool) {
        let mut inner = self.inner.write();
        for &handle in handles {
            let Some(index) = inner.locate(handle) else {
                continue;
            };
            if commit {
                inner.release(index);
            } else if let Some(entry) = inner.slots[index].entry.as_mut() {
                entry.busy = false;
            }
        }
        if commit && !handles.is_empty() {
            debug!(count = handles.len(), "Handles transferred out");
        }
    }

    /// Empty the table, returning every dispatcher for the caller to close
    pub fn drain(&self) -> Vec<Arc<Dispatcher>> {
        let mut inner = self.inner.write();
        let indices: Vec<usize> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, _)| index)
            .collect();
        indices
            .into_iter()
            .filter_map(|index| inner.release(index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_handles
    }
}

impl std::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("HandleTable")
            .field("live", &inner.live)
            .field("slots", &inner.slots.len())
            .field("quarantined", &inner.free.len())
            .field("max_handles", &self.max_handles)
            .finish()
    }
}
