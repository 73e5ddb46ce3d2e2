/*!
 * Handle Table Tests
 * Handle values, stale lookups and capacity through the manager
 */

use ipc_kernel::{
    Handle, IpcConfig, IpcError, IpcManager, MapBufferFlags, ReadMessageFlags, WriteMessageFlags,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn manager_with(max_handles: usize) -> IpcManager {
    let config = IpcConfig {
        max_handles,
        ..IpcConfig::restricted()
    };
    IpcManager::new(config).unwrap()
}

#[test]
fn test_values_are_never_zero() {
    let ipc = manager_with(64);
    let (a, b) = ipc.create_message_pipe(None).unwrap();
    assert!(a.is_valid());
    assert!(b.is_valid());
    assert_ne!(a, b);
}

#[test]
fn test_closed_values_are_not_reissued_soon() {
    let ipc = manager_with(64);
    let mut seen = HashSet::new();
    for _ in 0..200 {
        let buffer = ipc.create_shared_buffer(8, None).unwrap();
        assert!(seen.insert(buffer), "handle {} issued twice", buffer);
        ipc.close(buffer).unwrap();
    }
    assert_eq!(ipc.handle_count(), 0);
}

#[test]
fn test_stale_handle_does_not_resolve() {
    let ipc = manager_with(64);
    let old = ipc.create_shared_buffer(8, None).unwrap();
    ipc.close(old).unwrap();
    let _new = ipc.create_shared_buffer(8, None).unwrap();

    assert!(matches!(ipc.buffer_info(old), Err(IpcError::NotFound(_))));
    assert!(matches!(ipc.close(old), Err(IpcError::InvalidArgument(_))));
}

#[test]
fn test_invalid_handle_lookups() {
    let ipc = manager_with(64);
    assert!(matches!(
        ipc.signals_state(Handle::INVALID),
        Err(IpcError::NotFound(_))
    ));
    assert!(matches!(
        ipc.close(Handle::from_raw(u32::MAX)),
        Err(IpcError::InvalidArgument(_))
    ));
}

#[test]
fn test_pair_creation_is_atomic_when_full() {
    let ipc = manager_with(3);
    ipc.create_message_pipe(None).unwrap();
    assert!(matches!(
        ipc.create_message_pipe(None),
        Err(IpcError::ResourceExhausted(_))
    ));
    assert_eq!(ipc.handle_count(), 2);
    ipc.create_shared_buffer(8, None).unwrap();
    assert_eq!(ipc.handle_count(), 3);
}

#[test]
fn test_read_waits_for_room_in_table() {
    let ipc = manager_with(4);
    let (a, b) = ipc.create_message_pipe(None).unwrap();
    let (c, _d) = ipc.create_message_pipe(None).unwrap();
    ipc.write_message(a, b"cargo", &[c], WriteMessageFlags::empty())
        .unwrap();
    let filler = ipc.create_shared_buffer(8, None).unwrap();
    assert_eq!(ipc.handle_count(), 4);

    assert!(matches!(
        ipc.read_message(b, ReadMessageFlags::empty()),
        Err(IpcError::ResourceExhausted(_))
    ));

    ipc.close(filler).unwrap();
    let message = ipc.read_message(b, ReadMessageFlags::empty()).unwrap();
    assert_eq!(message.bytes, b"cargo");
    assert_eq!(message.handles.len(), 1);
}

#[test]
fn test_shutdown_closes_everything() {
    let ipc = manager_with(64);
    let (_a, _b) = ipc.create_message_pipe(None).unwrap();
    let buffer = ipc.create_shared_buffer(32, None).unwrap();
    let mapping = ipc.map_buffer(buffer, 0, 32, MapBufferFlags::empty()).unwrap();

    assert_eq!(ipc.shutdown(), 3);
    assert_eq!(ipc.handle_count(), 0);
    // Mappings survive the handles
    assert_eq!(mapping.len(), 32);
}
