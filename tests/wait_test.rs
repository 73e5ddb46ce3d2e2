/*!
 * Wait Tests
 * Blocking and async waits across threads
 */

use ipc_kernel::{
    CreateDataPipeFlags, CreateDataPipeOptions, Deadline, HandleSignals, IpcConfig, IpcError,
    IpcManager, ReadDataFlags, ReadMessageFlags, ResultCode, WriteDataFlags, WriteMessageFlags,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn manager() -> Arc<IpcManager> {
    Arc::new(IpcManager::new(IpcConfig::restricted()).unwrap())
}

#[test]
fn test_write_from_other_thread_wakes_reader() {
    let ipc = manager();
    let (a, b) = ipc.create_message_pipe(None).unwrap();

    let writer = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ipc.write_message(a, b"wake", &[], WriteMessageFlags::empty())
                .unwrap();
        })
    };

    let state = ipc
        .wait(b, HandleSignals::READABLE, Deadline::INDEFINITE)
        .unwrap();
    assert!(state.satisfied.is_readable());
    writer.join().unwrap();
}

#[test]
fn test_close_during_wait_cancels() {
    let ipc = manager();
    let (_a, b) = ipc.create_message_pipe(None).unwrap();

    let closer = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ipc.close(b).unwrap();
        })
    };

    let err = ipc
        .wait(b, HandleSignals::READABLE, Deadline::INDEFINITE)
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::Cancelled);
    assert_eq!(err.index, Some(0));
    closer.join().unwrap();
}

#[test]
fn test_peer_close_makes_wait_unsatisfiable() {
    let ipc = manager();
    let (producer, consumer) = ipc.create_data_pipe(None).unwrap();

    // Fill the pipe so WRITABLE is not already satisfied
    let capacity = ipc.config().default_data_pipe_capacity as usize;
    ipc.write_data(producer, &vec![0u8; capacity], WriteDataFlags::empty())
        .unwrap();

    let closer = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ipc.close(consumer).unwrap();
        })
    };

    let err = ipc
        .wait(producer, HandleSignals::WRITABLE, Deadline::INDEFINITE)
        .unwrap_err();
    assert!(matches!(err.error, IpcError::FailedPrecondition(_)));
    assert!(err.states[0].satisfied.is_peer_closed());
    closer.join().unwrap();
}

#[test]
fn test_sending_handle_ends_its_waits() {
    let ipc = manager();
    let (a, b) = ipc.create_message_pipe(None).unwrap();
    let (producer, consumer) = ipc.create_data_pipe(None).unwrap();

    let waiter = {
        let ipc = ipc.clone();
        thread::spawn(move || ipc.wait(consumer, HandleSignals::READABLE, Deadline::INDEFINITE))
    };
    thread::sleep(Duration::from_millis(20));
    ipc.write_message(a, b"take", &[consumer], WriteMessageFlags::empty())
        .unwrap();

    let err = waiter.join().unwrap().unwrap_err();
    assert_eq!(err.code(), ResultCode::Cancelled);
    assert_eq!(err.index, Some(0));

    // The receiver can still wait on the moved endpoint
    let moved = ipc.read_message(b, ReadMessageFlags::empty()).unwrap().handles[0];
    ipc.write_data(producer, b"after", WriteDataFlags::empty())
        .unwrap();
    let state = ipc
        .wait(moved, HandleSignals::READABLE, Deadline::INDEFINITE)
        .unwrap();
    assert!(state.satisfied.is_readable());
}

#[test]
fn test_one_write_wakes_every_waiter() {
    const WAITERS: usize = 6;
    let ipc = manager();
    let (a, b) = ipc.create_message_pipe(None).unwrap();
    let barrier = Arc::new(Barrier::new(WAITERS + 1));

    let waiters: Vec<_> = (0..WAITERS)
        .map(|_| {
            let ipc = ipc.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ipc.wait(b, HandleSignals::READABLE, Deadline::INDEFINITE)
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(20));
    ipc.write_message(a, b"all", &[], WriteMessageFlags::empty())
        .unwrap();

    for waiter in waiters {
        assert!(waiter.join().unwrap().unwrap().satisfied.is_readable());
    }
}

#[test]
fn test_data_pipe_stream_across_threads() {
    const ELEMENTS: u32 = 20_000;
    let ipc = manager();
    let options = CreateDataPipeOptions::new(CreateDataPipeFlags::empty(), 4, 64);
    let (producer, consumer) = ipc.create_data_pipe(Some(&options)).unwrap();

    let writer = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            let mut next = 0u32;
            while next < ELEMENTS {
                let batch: Vec<u8> = (next..ELEMENTS.min(next + 7))
                    .flat_map(u32::to_le_bytes)
                    .collect();
                match ipc.write_data(producer, &batch, WriteDataFlags::empty()) {
                    Ok(written) => next += (written / 4) as u32,
                    Err(e) if e.is_should_wait() => {
                        ipc.wait(producer, HandleSignals::WRITABLE, Deadline::INDEFINITE)
                            .unwrap();
                    }
                    Err(e) => panic!("write failed: {}", e),
                }
            }
            ipc.close(producer).unwrap();
        })
    };

    let mut expected = 0u32;
    loop {
        match ipc.read_data(consumer, 40, ReadDataFlags::empty()) {
            Ok(data) => {
                for chunk in data.into_bytes().chunks_exact(4) {
                    let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    assert_eq!(value, expected);
                    expected += 1;
                }
            }
            Err(e) if e.is_should_wait() => {
                let _ = ipc.wait(consumer, HandleSignals::READABLE, Deadline::INDEFINITE);
            }
            Err(IpcError::FailedPrecondition(_)) => break,
            Err(e) => panic!("read failed: {}", e),
        }
    }
    writer.join().unwrap();
    assert_eq!(expected, ELEMENTS);
}

#[test]
fn test_message_order_across_threads() {
    const MESSAGES: u32 = 5_000;
    let ipc = manager();
    let (a, b) = ipc.create_message_pipe(None).unwrap();

    let sender = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            for i in 0..MESSAGES {
                ipc.write_message(a, &i.to_le_bytes(), &[], WriteMessageFlags::empty())
                    .unwrap();
            }
        })
    };

    for expected in 0..MESSAGES {
        let message = loop {
            match ipc.read_message(b, ReadMessageFlags::empty()) {
                Ok(message) => break message,
                Err(e) if e.is_should_wait() => {
                    ipc.wait(b, HandleSignals::READABLE, Deadline::INDEFINITE)
                        .unwrap();
                }
                Err(e) => panic!("read failed: {}", e),
            }
        };
        assert_eq!(message.bytes, expected.to_le_bytes());
    }
    sender.join().unwrap();
}

#[test]
fn test_deadline_expires() {
    let ipc = manager();
    let (_a, b) = ipc.create_message_pipe(None).unwrap();

    let start = Instant::now();
    let err = ipc
        .wait(
            b,
            HandleSignals::READABLE,
            Deadline::from_duration(Duration::from_millis(30)),
        )
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::DeadlineExceeded);
    assert_eq!(err.index, None);
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn test_poll_never_blocks() {
    let ipc = manager();
    let (a, b) = ipc.create_message_pipe(None).unwrap();

    let err = ipc
        .wait(b, HandleSignals::READABLE, Deadline::POLL)
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::DeadlineExceeded);

    // Already satisfied wins even with a zero deadline
    let state = ipc.wait(a, HandleSignals::WRITABLE, Deadline::POLL).unwrap();
    assert!(state.satisfied.is_writable());
}

#[test]
fn test_wait_many_reports_ready_index() {
    let ipc = manager();
    let (a1, b1) = ipc.create_message_pipe(None).unwrap();
    let (a2, b2) = ipc.create_message_pipe(None).unwrap();

    let writer = {
        let ipc = ipc.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ipc.write_message(a2, b"second", &[], WriteMessageFlags::empty())
                .unwrap();
        })
    };

    let ready = ipc
        .wait_many(
            &[b1, b2],
            &[HandleSignals::READABLE, HandleSignals::READABLE],
            Deadline::INDEFINITE,
        )
        .unwrap();
    assert_eq!(ready.index, 1);
    assert_eq!(ready.states.len(), 2);
    assert!(ready.states[1].satisfied.is_readable());
    assert!(!ready.states[0].satisfied.is_readable());
    writer.join().unwrap();
    ipc.close(a1).unwrap();
}

#[test]
fn test_wait_many_argument_errors() {
    let ipc = manager();
    let (a, _b) = ipc.create_message_pipe(None).unwrap();

    let err = ipc.wait_many(&[], &[], Deadline::POLL).unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);

    let err = ipc
        .wait_many(&[a], &[HandleSignals::READABLE, HandleSignals::WRITABLE], Deadline::POLL)
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);

    let stale = a;
    ipc.close(a).unwrap();
    let err = ipc
        .wait(stale, HandleSignals::READABLE, Deadline::POLL)
        .unwrap_err();
    assert_eq!(err.index, Some(0));
    assert_eq!(err.code(), ResultCode::NotFound);
}

#[test]
fn test_buffer_wait_fails_immediately() {
    let ipc = manager();
    let buffer = ipc.create_shared_buffer(8, None).unwrap();
    let err = ipc
        .wait(buffer, HandleSignals::READABLE, Deadline::INDEFINITE)
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::FailedPrecondition);
}

#[tokio::test]
async fn test_async_wait_wakes_on_write() {
    let ipc = manager();
    let (producer, consumer) = ipc.create_data_pipe(None).unwrap();

    let writer = {
        let ipc = ipc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ipc.write_data(producer, b"async", WriteDataFlags::empty())
                .unwrap();
        })
    };

    let state = ipc
        .wait_async(consumer, HandleSignals::READABLE, Deadline::INDEFINITE)
        .await
        .unwrap();
    assert!(state.satisfied.is_readable());
    writer.await.unwrap();
}

#[tokio::test]
async fn test_async_wait_deadline() {
    let ipc = manager();
    let (_a, b) = ipc.create_message_pipe(None).unwrap();
    let err = ipc
        .wait_many_async(
            &[b],
            &[HandleSignals::READABLE],
            Deadline::from_duration(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::DeadlineExceeded);
}

#[tokio::test]
async fn test_async_wait_released_by_shutdown() {
    let ipc = manager();
    let (_a, b) = ipc.create_message_pipe(None).unwrap();

    let closer = {
        let ipc = ipc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ipc.shutdown()
        })
    };

    let err = ipc
        .wait_async(b, HandleSignals::READABLE, Deadline::INDEFINITE)
        .await
        .unwrap_err();
    // Depending on close order the peer or the handle itself goes first
    assert!(matches!(
        err.code(),
        ResultCode::Cancelled | ResultCode::FailedPrecondition
    ));
    assert_eq!(closer.await.unwrap(), 2);
    assert_eq!(ipc.handle_count(), 0);
}
