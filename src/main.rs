/*!
 * IPC Kernel - Self-Check Entry Point
 *
 * Brings up the process-wide engine and exercises it end to end:
 * - Message pipe ping-pong across threads
 * - A data pipe handed over inside a message
 * - A shared buffer seen through two handles
 */

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::thread;
use tracing::info;

use ipc_kernel::monitoring::{generate_run_id, OperationSpan};
use ipc_kernel::{
    init_tracing, ipc, Deadline, DuplicateBufferHandleFlags, DuplicateBufferHandleOptions,
    HandleSignals, IpcConfig, IpcManager, MapBufferFlags, ReadData, ReadDataFlags,
    ReadMessageFlags, WriteDataFlags, WriteMessageFlags,
};

const PING_ROUNDS: u32 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let run_id = generate_run_id();

    info!(run_id = %run_id, "IPC kernel self-check starting...");
    info!("================================================");

    let config = IpcConfig::from_env();
    config.validate().context("invalid IPC configuration")?;
    let manager = ipc::init(config).context("failed to initialize IPC engine")?;

    let span = OperationSpan::new("ping_pong", &run_id);
    let outcome = ping_pong(manager.clone());
    span.finish(outcome.is_ok());
    outcome?;

    let span = OperationSpan::new("data_pipe_handoff", &run_id);
    let outcome = data_pipe_handoff(&manager).await;
    span.finish(outcome.is_ok());
    outcome?;

    let span = OperationSpan::new("shared_buffer", &run_id);
    let outcome = shared_buffer(&manager);
    span.finish(outcome.is_ok());
    outcome?;

    let stats = manager.stats();
    info!(
        stats = %serde_json::to_string(&stats).context("failed to encode stats")?,
        "Engine statistics"
    );

    let closed = ipc::shutdown()?;
    info!(closed, "IPC kernel self-check complete");
    Ok(())
}

/// Echo messages between the main thread and a worker
fn ping_pong(manager: Arc<IpcManager>) -> Result<()> {
    let (local, remote) = manager.create_message_pipe(None)?;

    let worker_manager = manager.clone();
    let worker = thread::spawn(move || -> ipc_kernel::IpcResult<u32> {
        let mut echoed = 0;
        loop {
            match worker_manager.wait(remote, HandleSignals::READABLE, Deadline::INDEFINITE) {
                Ok(_) => {}
                // Main side hung up
                Err(e) if e.code() == ipc_kernel::ResultCode::FailedPrecondition => break,
                Err(e) => return Err(e.error),
            }
            let message = worker_manager.read_message(remote, ReadMessageFlags::empty())?;
            worker_manager.write_message(remote, &message.bytes, &[], WriteMessageFlags::empty())?;
            echoed += 1;
        }
        worker_manager.close(remote)?;
        Ok(echoed)
    });

    for round in 0..PING_ROUNDS {
        let payload = round.to_le_bytes();
        manager.write_message(local, &payload, &[], WriteMessageFlags::empty())?;
        manager
            .wait(local, HandleSignals::READABLE, Deadline::INDEFINITE)
            .map_err(|e| e.error)?;
        let reply = manager.read_message(local, ReadMessageFlags::empty())?;
        if reply.bytes != payload {
            bail!("round {} echoed {:?}", round, reply.bytes);
        }
    }
    manager.close(local)?;

    let echoed = worker
        .join()
        .map_err(|_| anyhow::anyhow!("echo worker panicked"))??;
    info!(rounds = echoed, "Ping-pong complete");
    Ok(())
}

/// Send a data pipe producer through a message pipe and stream through it
async fn data_pipe_handoff(manager: &Arc<IpcManager>) -> Result<()> {
    let (sender, receiver) = manager.create_message_pipe(None)?;
    let (producer, consumer) = manager.create_data_pipe(None)?;

    manager.write_message(sender, b"producer", &[producer], WriteMessageFlags::empty())?;
    manager
        .wait_async(receiver, HandleSignals::READABLE, Deadline::INDEFINITE)
        .await
        .map_err(|e| e.error)?;
    let message = manager.read_message(receiver, ReadMessageFlags::empty())?;
    let &[moved_producer] = message.handles.as_slice() else {
        bail!("expected one transferred handle, got {}", message.handles.len());
    };

    let written = manager.write_data(moved_producer, b"streamed bytes", WriteDataFlags::ALL_OR_NONE)?;
    manager.close(moved_producer)?;

    manager
        .wait_async(consumer, HandleSignals::READABLE, Deadline::INDEFINITE)
        .await
        .map_err(|e| e.error)?;
    let ReadData::Data(bytes) = manager.read_data(consumer, written, ReadDataFlags::ALL_OR_NONE)? else {
        bail!("plain read returned no data");
    };
    if bytes != b"streamed bytes" {
        bail!("data pipe delivered {:?}", bytes);
    }

    for handle in [sender, receiver, consumer] {
        manager.close(handle)?;
    }
    info!(bytes = written, "Data pipe handoff complete");
    Ok(())
}

/// Write through one handle, read through a read-only duplicate
fn shared_buffer(manager: &Arc<IpcManager>) -> Result<()> {
    let buffer = manager.create_shared_buffer(4096, None)?;
    let read_only = manager.duplicate_buffer_handle(
        buffer,
        Some(&DuplicateBufferHandleOptions::new(DuplicateBufferHandleFlags::READ_ONLY)),
    )?;

    let writer = manager.map_buffer(buffer, 0, 4096, MapBufferFlags::empty())?;
    writer.write_at(100, b"hello")?;

    let reader = manager.map_buffer(read_only, 100, 5, MapBufferFlags::empty())?;
    if reader.to_vec() != b"hello" {
        bail!("duplicate handle sees {:?}", reader.to_vec());
    }
    if reader.write_at(0, b"x").is_ok() {
        bail!("read-only mapping accepted a write");
    }

    manager.close(buffer)?;
    manager.close(read_only)?;
    info!("Shared buffer check complete");
    Ok(())
}
