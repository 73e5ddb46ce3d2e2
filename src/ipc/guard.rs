/*!
 * Scoped Handles
 *
 * RAII ownership of a handle: closed automatically when the guard drops.
 *
 * # Example
 *
 * ```ignore
 * let (a, b) = ScopedHandle::message_pipe(&manager)?;
 * manager.write_message(a.get(), b"ping", &[], WriteMessageFlags::empty())?;
 * // Both endpoints closed here
 * ```
 */

use super::manager::IpcManager;
use crate::abi::{CreateDataPipeOptions, Handle, WriteMessageFlags};
use crate::core::errors::IpcResult;
use std::sync::Arc;
use tracing::trace;

/// Owns one handle value and closes it on drop
///
/// A guarded handle must not be sent through `IpcManager::write_message`
/// directly: the guard would later close whatever the reused value names.
/// Call `release` first, or send through `ScopedHandle::write_message`,
/// which disarms the guards it moves.
pub struct ScopedHandle {
    handle: Handle,
    manager: Arc<IpcManager>,
}

impl ScopedHandle {
    pub fn new(manager: Arc<IpcManager>, handle: Handle) -> Self {
        Self { handle, manager }
    }

    /// Wrap both handles of a factory result
    pub fn pair(manager: &Arc<IpcManager>, (a, b): (Handle, Handle)) -> (Self, Self) {
        (Self::new(manager.clone(), a), Self::new(manager.clone(), b))
    }

    pub fn message_pipe(manager: &Arc<IpcManager>) -> IpcResult<(Self, Self)> {
        let handles = manager.create_message_pipe(None)?;
        Ok(Self::pair(manager, handles))
    }

    /// Producer first, consumer second
    pub fn data_pipe(
        manager: &Arc<IpcManager>,
        options: Option<&CreateDataPipeOptions>,
    ) -> IpcResult<(Self, Self)> {
        let handles = manager.create_data_pipe(options)?;
        Ok(Self::pair(manager, handles))
    }

    #[inline]
    pub fn get(&self) -> Handle {
        self.handle
    }

    /// Give up ownership without closing
    pub fn release(mut self) -> Handle {
        std::mem::replace(&mut self.handle, Handle::INVALID)
    }

    /// Write a message on this handle carrying `cargo`
    ///
    /// On success every cargo guard is disarmed, since its handle now
    /// belongs to the reader. On failure the guards still own their handles.
    pub fn write_message(
        &self,
        bytes: &[u8],
        cargo: &mut [ScopedHandle],
        flags: WriteMessageFlags,
    ) -> IpcResult<()> {
        let handles: Vec<Handle> = cargo.iter().map(ScopedHandle::get).collect();
        self.manager.write_message(self.handle, bytes, &handles, flags)?;
        for guard in cargo.iter_mut() {
            guard.handle = Handle::INVALID;
        }
        Ok(())
    }

    /// Close now, reporting the outcome
    pub fn close(mut self) -> IpcResult<()> {
        let handle = std::mem::replace(&mut self.handle, Handle::INVALID);
        self.manager.close(handle)
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        if !self.handle.is_valid() {
            return;
        }
        if let Err(e) = self.manager.close(self.handle) {
            trace!(handle = %self.handle, error = %e, "Scoped handle already gone");
        }
    }
}

impl std::fmt::Debug for ScopedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScopedHandle").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{HandleSignals, ReadMessageFlags, WriteDataFlags};
    use crate::core::IpcConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_drop_closes_and_signals_peer() {
        let manager = Arc::new(IpcManager::new(IpcConfig::restricted()).unwrap());
        let (a, b) = ScopedHandle::message_pipe(&manager).unwrap();
        let raw_b = b.get();
        drop(a);

        let state = manager.signals_state(raw_b).unwrap();
        assert!(state.satisfied.contains(HandleSignals::PEER_CLOSED));
        drop(b);
        assert_eq!(manager.handle_count(), 0);
    }

    #[test]
    fn test_release_keeps_handle_open() {
        let manager = Arc::new(IpcManager::new(IpcConfig::restricted()).unwrap());
        let (producer, consumer) = ScopedHandle::data_pipe(&manager, None).unwrap();
        let raw = producer.release();
        drop(consumer);
        assert!(manager.signals_state(raw).is_ok());
        manager.close(raw).unwrap();
    }

    #[test]
    fn test_sent_guard_does_not_close_receiver_handle() {
        let manager = Arc::new(IpcManager::new(IpcConfig::restricted()).unwrap());
        let (a, b) = ScopedHandle::message_pipe(&manager).unwrap();
        let (producer, consumer) = ScopedHandle::data_pipe(&manager, None).unwrap();

        let mut cargo = [consumer];
        a.write_message(b"take", &mut cargo, WriteMessageFlags::empty())
            .unwrap();
        assert!(!cargo[0].get().is_valid());
        drop(cargo);

        let received = manager
            .read_message(b.get(), ReadMessageFlags::empty())
            .unwrap()
            .handles[0];
        manager
            .write_data(producer.get(), b"still open", WriteDataFlags::empty())
            .unwrap();
        let state = manager.signals_state(received).unwrap();
        assert!(state.satisfied.is_readable());
        // a, b, producer and the received consumer
        assert_eq!(manager.handle_count(), 4);
        manager.close(received).unwrap();
    }

    #[test]
    fn test_failed_send_keeps_guard_armed() {
        let manager = Arc::new(IpcManager::new(IpcConfig::restricted()).unwrap());
        let (a, b) = ScopedHandle::message_pipe(&manager).unwrap();
        drop(b);

        let (_producer, consumer) = ScopedHandle::data_pipe(&manager, None).unwrap();
        let raw = consumer.get();
        let mut cargo = [consumer];
        assert!(a
            .write_message(b"lost", &mut cargo, WriteMessageFlags::empty())
            .is_err());
        assert_eq!(cargo[0].get(), raw);
        assert!(manager.signals_state(raw).is_ok());
        drop(cargo);
        assert!(manager.signals_state(raw).is_err());
    }
}
